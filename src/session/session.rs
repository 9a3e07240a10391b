use super::config::SessionConfig;
use super::sinks::Sinks;
use super::status::SessionStatus;
use crate::error::{ConnectionError, SessionError};
use crate::protocol::{self, EventKind};
use crate::token::{TokenClient, TokenRequest};
use crate::transport::{ConnectRequest, ConnectionState, Room, RoomConnector, RoomEvent};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// State shared between the session and its dispatcher task
struct SessionShared {
    config: SessionConfig,
    state: RwLock<ConnectionState>,
    microphone_enabled: AtomicBool,
    agent_present: AtomicBool,
    /// Bumped whenever a room is torn down; events from older rooms are dropped
    generation: AtomicU64,
    sinks: Sinks,
}

impl SessionShared {
    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Record a transition and notify the state sink if the value changed
    fn set_state(&self, new: ConnectionState) {
        self.apply_state(new, None);
    }

    fn apply_state(&self, new: ConnectionState, generation: Option<u64>) {
        let old = {
            let mut state = self.state.write();
            if generation.is_some_and(|g| !self.is_current(g)) {
                debug!("Ignoring {} from a closed room", new);
                return;
            }
            std::mem::replace(&mut *state, new)
        };
        if old == new {
            return;
        }

        info!("Connection state changed: {} -> {}", old, new);
        if new == ConnectionState::Disconnected {
            self.microphone_enabled.store(false, Ordering::SeqCst);
            self.agent_present.store(false, Ordering::SeqCst);
        }
        self.sinks.connection_state(new);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Stop accepting events from the current room
    fn retire_room(&self) {
        // Under the state lock so no transport transition is half applied
        let _state = self.state.write();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn handle_event(&self, generation: u64, event: RoomEvent) {
        if !self.is_current(generation) {
            debug!("Dropping event from a closed room");
            return;
        }

        match event {
            RoomEvent::DataReceived {
                payload,
                participant,
            } => match protocol::decode(&payload) {
                Ok(envelope) => match envelope.kind {
                    EventKind::TranscribedText => self.sinks.transcribed_text(&envelope.text),
                    EventKind::AssistantResponse => self.sinks.assistant_response(&envelope.text),
                    EventKind::Other(kind) => debug!("Ignoring '{}' message", kind),
                },
                Err(e) => warn!(
                    "Error parsing data packet from {}: {}",
                    participant.as_deref().unwrap_or("unknown participant"),
                    e
                ),
            },

            RoomEvent::ConnectionStateChanged(state) => self.apply_state(state, Some(generation)),

            RoomEvent::ParticipantConnected(identity) => {
                info!("Participant connected: {}", identity);
                if identity == self.config.agent_identity {
                    self.agent_present.store(true, Ordering::SeqCst);
                    self.sinks.agent_presence(true);
                }
            }

            RoomEvent::ParticipantDisconnected(identity) => {
                info!("Participant disconnected: {}", identity);
                if identity == self.config.agent_identity {
                    self.agent_present.store(false, Ordering::SeqCst);
                    self.sinks.agent_presence(false);
                }
            }

            RoomEvent::TrackSubscribed { participant, kind } => {
                info!("Track subscribed: {:?} from {}", kind, participant);
            }

            RoomEvent::MediaDevicesError(message) => {
                error!("Media device error: {}", message);
            }
        }
    }
}

/// Drains room events in arrival order
async fn dispatch_events(
    mut events: mpsc::Receiver<RoomEvent>,
    shared: Arc<SessionShared>,
    generation: u64,
) {
    debug!("Event dispatcher started");
    while let Some(event) = events.recv().await {
        shared.handle_event(generation, event);
    }
    debug!("Event dispatcher stopped");
}

struct ActiveRoom {
    room: Box<dyn Room>,
    dispatcher: JoinHandle<()>,
}

impl ActiveRoom {
    /// Stop the dispatcher and wait until no sink call from it is still running
    async fn stop_dispatcher(&mut self, shared: &SessionShared) {
        shared.retire_room();
        self.dispatcher.abort();
        if let Err(e) = (&mut self.dispatcher).await {
            if e.is_panic() {
                error!("Event dispatcher panicked: {}", e);
            }
        }
    }
}

/// Connection to the voice assistant's room
///
/// Owns the room handle, mirrors the transport's connection state, and turns
/// data-bus messages into transcribed-text / assistant-response callbacks.
/// Operations are serialized internally: a second call waits for the first.
pub struct VoiceSession {
    shared: Arc<SessionShared>,
    token_client: Arc<dyn TokenClient>,
    connector: Arc<dyn RoomConnector>,
    local_identity: OnceLock<String>,
    room: Mutex<Option<ActiveRoom>>,
}

impl VoiceSession {
    pub fn new(
        config: SessionConfig,
        token_client: Arc<dyn TokenClient>,
        connector: Arc<dyn RoomConnector>,
    ) -> Self {
        info!(
            "Creating voice session for room {} ({} transport)",
            config.room_name,
            connector.name()
        );

        Self {
            shared: Arc::new(SessionShared {
                config,
                state: RwLock::new(ConnectionState::Disconnected),
                microphone_enabled: AtomicBool::new(false),
                agent_present: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                sinks: Sinks::default(),
            }),
            token_client,
            connector,
            local_identity: OnceLock::new(),
            room: Mutex::new(None),
        }
    }

    /// Join the room as `identity` and turn the microphone on.
    ///
    /// No-op while a room is already live. The first call fixes the session's
    /// identity; later calls must use the same one.
    pub async fn connect(&self, identity: &str) -> Result<(), SessionError> {
        if identity.trim().is_empty() {
            return Err(SessionError::InvalidIdentity(
                "identity must not be empty".to_string(),
            ));
        }

        let mut active = self.room.lock().await;

        if let Some(existing) = self.local_identity.get() {
            if existing != identity {
                return Err(SessionError::InvalidIdentity(format!(
                    "session already uses identity '{}'",
                    existing
                )));
            }
        }

        if active.is_some() && self.state() != ConnectionState::Disconnected {
            info!("Already connected to room");
            return Ok(());
        }

        // The transport dropped us earlier; release what is left of that room
        if let Some(mut stale) = active.take() {
            stale.stop_dispatcher(&self.shared).await;
            if let Err(e) = stale.room.disconnect().await {
                debug!("Releasing dropped room: {}", e);
            }
        }

        let identity = self.local_identity.get_or_init(|| identity.to_string()).clone();
        let room_name = self.shared.config.room_name.clone();

        self.shared.set_state(ConnectionState::Connecting);

        let token_request = TokenRequest {
            room_name: room_name.clone(),
            participant_identity: identity.clone(),
        };
        let token = match self.token_client.fetch_token(&token_request).await {
            Ok(token) => token,
            Err(e) => {
                error!("Failed to connect to room: {}", e);
                self.shared.set_state(ConnectionState::Disconnected);
                return Err(ConnectionError::Token(e).into());
            }
        };

        let request = ConnectRequest {
            room_name,
            identity,
            token,
        };
        let (room, events) = match self.connector.connect(request).await {
            Ok(opened) => opened,
            Err(e) => {
                error!("Failed to connect to room: {}", e);
                self.shared.set_state(ConnectionState::Disconnected);
                return Err(e.into());
            }
        };

        info!("Connected to room: {}", room.room_name());
        self.shared.set_state(ConnectionState::Connected);

        let generation = self.shared.generation.load(Ordering::SeqCst);
        let dispatcher = tokio::spawn(dispatch_events(
            events,
            Arc::clone(&self.shared),
            generation,
        ));
        *active = Some(ActiveRoom { room, dispatcher });

        if self.shared.config.auto_enable_audio {
            self.set_microphone(&mut active, true).await?;
        }

        Ok(())
    }

    /// Leave the room. Always succeeds locally, also when nothing is connected.
    pub async fn disconnect(&self) {
        let mut active = self.room.lock().await;

        if let Some(mut current) = active.take() {
            current.stop_dispatcher(&self.shared).await;
            self.shared.set_state(ConnectionState::Disconnecting);
            if let Err(e) = current.room.disconnect().await {
                warn!("Error while leaving room: {}", e);
            }
            info!("Disconnected from room");
        }

        self.shared.microphone_enabled.store(false, Ordering::SeqCst);
        self.shared.agent_present.store(false, Ordering::SeqCst);
        self.shared.set_state(ConnectionState::Disconnected);
    }

    /// Start publishing the microphone. No-op without a live room.
    pub async fn enable_audio(&self) -> Result<(), SessionError> {
        let mut active = self.room.lock().await;
        self.set_microphone(&mut active, true).await
    }

    /// Stop publishing the microphone. No-op without a live room.
    pub async fn disable_audio(&self) -> Result<(), SessionError> {
        let mut active = self.room.lock().await;
        self.set_microphone(&mut active, false).await
    }

    async fn set_microphone(
        &self,
        active: &mut Option<ActiveRoom>,
        enabled: bool,
    ) -> Result<(), SessionError> {
        let Some(current) = active.as_mut() else {
            debug!("No room, ignoring microphone change");
            return Ok(());
        };
        if self.state() == ConnectionState::Disconnected {
            debug!("Room was dropped, ignoring microphone change");
            return Ok(());
        }

        let action = if enabled { "enable" } else { "disable" };
        match current.room.set_microphone_enabled(enabled).await {
            Ok(()) => {
                self.shared
                    .microphone_enabled
                    .store(enabled, Ordering::SeqCst);
                info!("Local audio {}d", action);
                Ok(())
            }
            Err(e) => {
                error!("Failed to {} audio: {}", action, e);
                Err(e.into())
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn microphone_enabled(&self) -> bool {
        self.shared.microphone_enabled.load(Ordering::SeqCst)
    }

    pub fn agent_present(&self) -> bool {
        self.shared.agent_present.load(Ordering::SeqCst)
    }

    pub fn local_identity(&self) -> Option<&str> {
        self.local_identity.get().map(String::as_str)
    }

    pub fn room_name(&self) -> &str {
        &self.shared.config.room_name
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state(),
            local_identity: self.local_identity().map(str::to_string),
            microphone_enabled: self.microphone_enabled(),
            room_name: self.room_name().to_string(),
            agent_present: self.agent_present(),
        }
    }

    pub fn on_transcribed_text(&self, sink: impl Fn(&str) + Send + Sync + 'static) {
        self.shared.sinks.set_transcribed_text(Arc::new(sink));
    }

    pub fn on_assistant_response(&self, sink: impl Fn(&str) + Send + Sync + 'static) {
        self.shared.sinks.set_assistant_response(Arc::new(sink));
    }

    pub fn on_connection_state_changed(
        &self,
        sink: impl Fn(ConnectionState) + Send + Sync + 'static,
    ) {
        self.shared.sinks.set_connection_state(Arc::new(sink));
    }

    /// Called with `true`/`false` when the agent joins/leaves the room
    pub fn on_agent_presence(&self, sink: impl Fn(bool) + Send + Sync + 'static) {
        self.shared.sinks.set_agent_presence(Arc::new(sink));
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        if let Some(active) = self.room.get_mut().take() {
            warn!("Voice session dropped while connected to {}", active.room.room_name());
            active.dispatcher.abort();
        }
    }
}
