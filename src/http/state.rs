use crate::client::VoiceClient;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The process's one voice session and its transcript
    pub client: Arc<VoiceClient>,

    /// Identity used when a connect request doesn't name one
    pub default_identity: String,
}

impl AppState {
    pub fn new(client: Arc<VoiceClient>, default_identity: impl Into<String>) -> Self {
        Self {
            client,
            default_identity: default_identity.into(),
        }
    }
}
