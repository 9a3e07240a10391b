use crate::error::TokenError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// Body of a token request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    pub room_name: String,
    pub participant_identity: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    detail: Option<String>,
}

/// Source of room credentials
#[async_trait::async_trait]
pub trait TokenClient: Send + Sync {
    /// Get a short-lived credential for `request.participant_identity` in `request.room_name`
    async fn fetch_token(&self, request: &TokenRequest) -> Result<String, TokenError>;
}

/// Token client for the backend's `POST /get-token` endpoint
pub struct HttpTokenClient {
    endpoint: String,
    client: Client,
}

impl HttpTokenClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TokenError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl TokenClient for HttpTokenClient {
    async fn fetch_token(&self, request: &TokenRequest) -> Result<String, TokenError> {
        let url = format!("{}/get-token", self.endpoint);
        info!(
            "Requesting token for {} in room {}",
            request.participant_identity, request.room_name
        );

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            // The backend reports failures as {"detail": "..."}; fall back when it doesn't
            let detail = response
                .json::<TokenErrorBody>()
                .await
                .ok()
                .and_then(|body| body.detail)
                .unwrap_or_else(|| "Failed to get token".to_string());
            error!("Token service returned {}: {}", status, detail);
            return Err(TokenError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| TokenError::InvalidResponse(e.to_string()))?;

        if body.token.is_empty() {
            return Err(TokenError::InvalidResponse("empty token".to_string()));
        }

        Ok(body.token)
    }
}
