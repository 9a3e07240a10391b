use serde::{Deserialize, Serialize};

/// Room every client of this process joins
pub const DEFAULT_ROOM_NAME: &str = "voice-assistant-room";

/// Identity the AI agent joins the room with
pub const DEFAULT_AGENT_IDENTITY: &str = "python-agent";

/// Configuration for a voice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Process-wide room name used for every token request
    pub room_name: String,

    /// Participant identity of the agent, used to report its presence
    pub agent_identity: String,

    /// Turn the microphone on as soon as the room is joined
    pub auto_enable_audio: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            room_name: DEFAULT_ROOM_NAME.to_string(),
            agent_identity: DEFAULT_AGENT_IDENTITY.to_string(),
            auto_enable_audio: true,
        }
    }
}
