use crate::error::{ConnectionError, DeviceError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Connection state of a room as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnecting => "disconnecting",
        };
        f.write_str(s)
    }
}

/// Kind of a remote media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Event delivered by a room, in the order the transport observed it
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// Binary application message on the data bus
    DataReceived {
        payload: Vec<u8>,
        participant: Option<String>,
    },
    ConnectionStateChanged(ConnectionState),
    ParticipantConnected(String),
    ParticipantDisconnected(String),
    TrackSubscribed { participant: String, kind: TrackKind },
    MediaDevicesError(String),
}

/// Everything a connector needs to join a room
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub room_name: String,
    pub identity: String,
    pub token: String,
}

/// A live room connection
#[async_trait::async_trait]
pub trait Room: Send + Sync {
    fn room_name(&self) -> &str;

    fn local_identity(&self) -> &str;

    /// Leave the room. Event delivery stops afterwards.
    async fn disconnect(&mut self) -> Result<(), ConnectionError>;

    /// Start or stop capturing and publishing the local microphone
    async fn set_microphone_enabled(&mut self, enabled: bool) -> Result<(), DeviceError>;
}

/// Opens rooms
#[async_trait::async_trait]
pub trait RoomConnector: Send + Sync {
    async fn connect(
        &self,
        request: ConnectRequest,
    ) -> Result<(Box<dyn Room>, mpsc::Receiver<RoomEvent>), ConnectionError>;

    /// Connector name for logging
    fn name(&self) -> &str;
}
