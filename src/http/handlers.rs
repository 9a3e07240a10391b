use super::state::AppState;
use crate::conversation::ConversationTurn;
use crate::error::SessionError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    /// Participant identity (defaults to the process identity)
    pub identity: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(err: &SessionError) -> Response {
    let status = match err {
        SessionError::InvalidIdentity(_) => StatusCode::BAD_REQUEST,
        SessionError::Connection(_) => StatusCode::BAD_GATEWAY,
        SessionError::Device(_) => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn status_response(state: &AppState) -> Response {
    (StatusCode::OK, Json(state.client.session().status())).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /session
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    status_response(&state)
}

/// POST /session/connect
/// Join the room; the microphone is enabled on success
pub async fn connect(
    State(state): State<AppState>,
    body: Option<Json<ConnectRequest>>,
) -> impl IntoResponse {
    let identity = body
        .and_then(|Json(req)| req.identity)
        .unwrap_or_else(|| state.default_identity.clone());

    info!("Connect requested for {}", identity);

    match state.client.session().connect(&identity).await {
        Ok(()) => status_response(&state),
        Err(e) => {
            error!("Failed to connect: {}", e);
            error_response(&e)
        }
    }
}

/// POST /session/disconnect
pub async fn disconnect(State(state): State<AppState>) -> impl IntoResponse {
    state.client.session().disconnect().await;
    status_response(&state)
}

/// POST /session/audio/enable
pub async fn enable_audio(State(state): State<AppState>) -> impl IntoResponse {
    match state.client.session().enable_audio().await {
        Ok(()) => status_response(&state),
        Err(e) => error_response(&e),
    }
}

/// POST /session/audio/disable
pub async fn disable_audio(State(state): State<AppState>) -> impl IntoResponse {
    match state.client.session().disable_audio().await {
        Ok(()) => status_response(&state),
        Err(e) => error_response(&e),
    }
}

/// GET /session/transcript
/// Transcript accumulated so far
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let turns: Vec<ConversationTurn> = state.client.conversation().transcript().turns().to_vec();
    (StatusCode::OK, Json(turns))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
