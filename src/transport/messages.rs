use serde::{Deserialize, Serialize};

/// Microphone audio frame published to the room
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub identity: String,
    pub sequence: u32,
    pub pcm: String, // Base64-encoded PCM bytes
    pub sample_rate: u32,
    pub channels: u16,
    pub timestamp: String, // RFC3339 timestamp
    #[serde(rename = "final")]
    pub final_frame: bool,
}

/// Join/leave announcement on the presence subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMessage {
    pub identity: String,
    pub joined: bool,
}

/// NATS subjects for one room
#[derive(Debug, Clone)]
pub struct RoomSubjects {
    pub data: String,
    pub presence: String,
    pub audio_prefix: String,
}

impl RoomSubjects {
    pub fn new(room_name: &str) -> Self {
        Self {
            data: format!("room.{}.data", room_name),
            presence: format!("room.{}.presence", room_name),
            audio_prefix: format!("room.{}.audio", room_name),
        }
    }

    pub fn audio(&self, identity: &str) -> String {
        format!("{}.{}", self.audio_prefix, identity)
    }
}
