//! In-process room
//!
//! `InMemoryConnector` opens rooms that live entirely inside the process. The
//! paired [`RoomController`] plays the part of the server and the agent:
//! it pushes events into the room and scripts failures.

use super::room::{ConnectRequest, ConnectionState, Room, RoomConnector, RoomEvent, TrackKind};
use crate::error::{ConnectionError, DeviceError};
use crate::protocol::InboundEnvelope;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

const EVENT_BUFFER: usize = 64;

#[derive(Default)]
struct Shared {
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    microphone_enabled: AtomicBool,
    reject_next_connect: Mutex<Option<String>>,
    deny_microphone: Mutex<Option<String>>,
    events: Mutex<Option<mpsc::Sender<RoomEvent>>>,
    last_request: Mutex<Option<ConnectRequest>>,
}

pub struct InMemoryConnector {
    shared: Arc<Shared>,
}

impl InMemoryConnector {
    pub fn new() -> (Self, RoomController) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            RoomController { shared },
        )
    }
}

#[async_trait::async_trait]
impl RoomConnector for InMemoryConnector {
    async fn connect(
        &self,
        request: ConnectRequest,
    ) -> Result<(Box<dyn Room>, mpsc::Receiver<RoomEvent>), ConnectionError> {
        self.shared.connect_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.shared.reject_next_connect.lock().take() {
            return Err(ConnectionError::Transport(reason));
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        *self.shared.events.lock() = Some(tx);
        *self.shared.last_request.lock() = Some(request.clone());

        let room = InMemoryRoom {
            shared: Arc::clone(&self.shared),
            room_name: request.room_name,
            identity: request.identity,
        };

        Ok((Box::new(room), rx))
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

struct InMemoryRoom {
    shared: Arc<Shared>,
    room_name: String,
    identity: String,
}

#[async_trait::async_trait]
impl Room for InMemoryRoom {
    fn room_name(&self) -> &str {
        &self.room_name
    }

    fn local_identity(&self) -> &str {
        &self.identity
    }

    async fn disconnect(&mut self) -> Result<(), ConnectionError> {
        self.shared.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.microphone_enabled.store(false, Ordering::SeqCst);
        // Dropping the sender ends the session's dispatcher
        self.shared.events.lock().take();
        Ok(())
    }

    async fn set_microphone_enabled(&mut self, enabled: bool) -> Result<(), DeviceError> {
        if enabled {
            if let Some(reason) = self.shared.deny_microphone.lock().clone() {
                return Err(DeviceError::PermissionDenied(reason));
            }
        }
        self.shared.microphone_enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }
}

/// Server-side handle for rooms opened by an [`InMemoryConnector`]
#[derive(Clone)]
pub struct RoomController {
    shared: Arc<Shared>,
}

impl RoomController {
    /// Deliver an event to the open room. Returns false if no room is open.
    pub async fn send(&self, event: RoomEvent) -> bool {
        let sender = self.shared.events.lock().clone();
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => {
                debug!("No open room, dropping {:?}", event);
                false
            }
        }
    }

    pub async fn send_data(&self, payload: impl Into<Vec<u8>>, participant: Option<&str>) -> bool {
        self.send(RoomEvent::DataReceived {
            payload: payload.into(),
            participant: participant.map(str::to_string),
        })
        .await
    }

    /// Publish an envelope as the agent would
    pub async fn send_envelope(&self, envelope: &InboundEnvelope) -> bool {
        self.send_data(envelope.to_bytes(), None).await
    }

    pub async fn set_state(&self, state: ConnectionState) -> bool {
        self.send(RoomEvent::ConnectionStateChanged(state)).await
    }

    pub async fn participant_joined(&self, identity: &str) -> bool {
        self.send(RoomEvent::ParticipantConnected(identity.to_string()))
            .await
    }

    pub async fn participant_left(&self, identity: &str) -> bool {
        self.send(RoomEvent::ParticipantDisconnected(identity.to_string()))
            .await
    }

    pub async fn track_subscribed(&self, participant: &str, kind: TrackKind) -> bool {
        self.send(RoomEvent::TrackSubscribed {
            participant: participant.to_string(),
            kind,
        })
        .await
    }

    /// Make the next connect attempt fail with `reason`
    pub fn reject_next_connect(&self, reason: impl Into<String>) {
        *self.shared.reject_next_connect.lock() = Some(reason.into());
    }

    /// Refuse microphone access (`None` allows it again)
    pub fn deny_microphone(&self, reason: Option<&str>) {
        *self.shared.deny_microphone.lock() = reason.map(str::to_string);
    }

    pub fn connect_calls(&self) -> usize {
        self.shared.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.shared.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn microphone_enabled(&self) -> bool {
        self.shared.microphone_enabled.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.shared.events.lock().is_some()
    }

    pub fn last_request(&self) -> Option<ConnectRequest> {
        self.shared.last_request.lock().clone()
    }
}
