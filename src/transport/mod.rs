//! Real-time room transport
//!
//! The session only talks to [`RoomConnector`] and [`Room`]; concrete
//! transports translate their own callbacks into an ordered stream of
//! [`RoomEvent`]s.

pub mod memory;
pub mod messages;
pub mod nats;
mod room;

pub use memory::{InMemoryConnector, RoomController};
pub use messages::{AudioFrameMessage, PresenceMessage, RoomSubjects};
pub use nats::NatsRoomConnector;
pub use room::{ConnectRequest, ConnectionState, Room, RoomConnector, RoomEvent, TrackKind};
