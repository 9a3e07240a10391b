//! HTTP control API for a presentation layer
//!
//! - GET /session - Session status
//! - POST /session/connect - Join the room
//! - POST /session/disconnect - Leave the room
//! - POST /session/audio/enable - Unmute
//! - POST /session/audio/disable - Mute
//! - GET /session/transcript - Transcript so far
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
