//! Voice session management
//!
//! This module provides the `VoiceSession` abstraction that manages:
//! - Token acquisition and room connection lifecycle
//! - Connection state tracking
//! - Decoding of data-bus messages into transcript callbacks
//! - Local microphone activation

mod config;
mod session;
mod sinks;
mod status;

pub use config::{SessionConfig, DEFAULT_AGENT_IDENTITY, DEFAULT_ROOM_NAME};
pub use session::VoiceSession;
pub use sinks::{PresenceSink, StateSink, TextSink};
pub use status::SessionStatus;
