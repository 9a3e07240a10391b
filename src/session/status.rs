use crate::transport::ConnectionState;
use serde::{Deserialize, Serialize};

/// Snapshot of a session for presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Current connection state
    pub state: ConnectionState,

    /// Identity used in the room, once assigned
    pub local_identity: Option<String>,

    /// Whether the local microphone is being published
    pub microphone_enabled: bool,

    /// Room this session joins
    pub room_name: String,

    /// Whether the agent is currently in the room
    pub agent_present: bool,
}
