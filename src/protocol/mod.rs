//! Data-bus message schema
//!
//! The agent publishes JSON envelopes on the room's data channel. Only two
//! kinds matter to the client (`transcribed_text` and `response`); anything
//! else decodes to [`EventKind::Other`] and is ignored by the session.

mod envelope;

pub use envelope::{decode, EventKind, InboundEnvelope, PROTOCOL_VERSION};
