pub mod audio;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod http;
pub mod protocol;
pub mod session;
pub mod token;
pub mod transport;

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioFrame, AudioSource,
    FileBackend,
};
pub use client::VoiceClient;
pub use config::Config;
pub use conversation::{ConversationAggregator, ConversationTurn, Speaker, Transcript};
pub use error::{ConnectionError, DecodeError, DeviceError, SessionError, TokenError};
pub use http::{create_router, AppState};
pub use protocol::{EventKind, InboundEnvelope};
pub use session::{SessionConfig, SessionStatus, VoiceSession};
pub use token::{HttpTokenClient, TokenClient, TokenRequest};
pub use transport::{
    ConnectionState, InMemoryConnector, NatsRoomConnector, Room, RoomConnector, RoomController,
    RoomEvent,
};
