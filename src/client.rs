use crate::config::Config;
use crate::conversation::ConversationAggregator;
use crate::session::VoiceSession;
use crate::token::HttpTokenClient;
use crate::transport::NatsRoomConnector;
use anyhow::{Context, Result};
use std::sync::Arc;

/// A session with its transcript attached
pub struct VoiceClient {
    session: Arc<VoiceSession>,
    conversation: ConversationAggregator,
}

impl VoiceClient {
    /// Attach a fresh transcript to `session`
    pub fn new(session: Arc<VoiceSession>) -> Self {
        let conversation = ConversationAggregator::new();
        conversation.attach(&session);
        Self {
            session,
            conversation,
        }
    }

    /// HTTP token service + NATS room, as configured
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let token_client = HttpTokenClient::new(cfg.token.endpoint.clone(), cfg.token_timeout())
            .context("Failed to build token client")?;
        let connector = NatsRoomConnector::new(
            cfg.room.nats_url.clone(),
            cfg.audio_source()?,
            cfg.audio_backend_config(),
        );

        let session = VoiceSession::new(
            cfg.session_config(),
            Arc::new(token_client),
            Arc::new(connector),
        );

        Ok(Self::new(Arc::new(session)))
    }

    pub fn session(&self) -> &Arc<VoiceSession> {
        &self.session
    }

    pub fn conversation(&self) -> &ConversationAggregator {
        &self.conversation
    }
}
