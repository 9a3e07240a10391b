//! Room transport over NATS
//!
//! A room is a set of subjects on a NATS server:
//! - `room.<name>.data`: application messages from the agent
//! - `room.<name>.presence`: participant join/leave announcements
//! - `room.<name>.audio.<identity>`: microphone frames, base64 PCM in JSON
//!
//! The room token is used as the NATS auth token.

use super::messages::{AudioFrameMessage, PresenceMessage, RoomSubjects};
use super::room::{ConnectRequest, ConnectionState, Room, RoomConnector, RoomEvent};
use crate::audio::convert::{process_frame, to_pcm_bytes};
use crate::audio::{AudioBackendConfig, AudioBackendFactory, AudioSource};
use crate::error::{ConnectionError, DeviceError};
use async_nats::Client;
use base64::Engine;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const EVENT_BUFFER: usize = 256;

pub struct NatsRoomConnector {
    url: String,
    audio_source: AudioSource,
    audio_config: AudioBackendConfig,
}

impl NatsRoomConnector {
    pub fn new(url: impl Into<String>, audio_source: AudioSource, audio_config: AudioBackendConfig) -> Self {
        Self {
            url: url.into(),
            audio_source,
            audio_config,
        }
    }
}

fn transport_error(context: &str, e: impl std::fmt::Display) -> ConnectionError {
    ConnectionError::Transport(format!("{}: {}", context, e))
}

#[async_trait::async_trait]
impl RoomConnector for NatsRoomConnector {
    async fn connect(
        &self,
        request: ConnectRequest,
    ) -> Result<(Box<dyn Room>, mpsc::Receiver<RoomEvent>), ConnectionError> {
        info!("Connecting to room {} at {}", request.room_name, self.url);

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let state_tx = tx.clone();

        let client = async_nats::ConnectOptions::with_token(request.token.clone())
            .event_callback(move |event| {
                let tx = state_tx.clone();
                async move {
                    // The client reconnects on its own; surface that as Reconnecting
                    let state = match event {
                        async_nats::Event::Connected => ConnectionState::Connected,
                        async_nats::Event::Disconnected => ConnectionState::Reconnecting,
                        other => {
                            warn!("NATS event: {}", other);
                            return;
                        }
                    };
                    let _ = tx.send(RoomEvent::ConnectionStateChanged(state)).await;
                }
            })
            .connect(self.url.as_str())
            .await
            .map_err(|e| transport_error("Failed to connect to NATS", e))?;

        let subjects = RoomSubjects::new(&request.room_name);

        let mut data_sub = client
            .subscribe(subjects.data.clone())
            .await
            .map_err(|e| transport_error("Failed to subscribe to data bus", e))?;
        let mut presence_sub = client
            .subscribe(subjects.presence.clone())
            .await
            .map_err(|e| transport_error("Failed to subscribe to presence", e))?;

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let own_identity = request.identity.clone();

        let forward_task = tokio::spawn(async move {
            debug!("Room event forwarding started");
            loop {
                let event = tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    msg = data_sub.next() => match msg {
                        Some(msg) => RoomEvent::DataReceived {
                            payload: msg.payload.to_vec(),
                            participant: None,
                        },
                        None => break,
                    },
                    msg = presence_sub.next() => match msg {
                        Some(msg) => match serde_json::from_slice::<PresenceMessage>(&msg.payload) {
                            Ok(p) if p.identity == own_identity => continue,
                            Ok(p) if p.joined => RoomEvent::ParticipantConnected(p.identity),
                            Ok(p) => RoomEvent::ParticipantDisconnected(p.identity),
                            Err(e) => {
                                warn!("Failed to parse presence message: {}", e);
                                continue;
                            }
                        },
                        None => break,
                    },
                };

                if tx.send(event).await.is_err() {
                    break;
                }
            }
            debug!("Room event forwarding stopped");
        });

        let room = NatsRoom {
            client,
            subjects,
            room_name: request.room_name,
            identity: request.identity,
            audio_source: self.audio_source.clone(),
            audio_config: self.audio_config.clone(),
            cancel,
            forward_task: Some(forward_task),
            microphone: None,
        };

        room.announce(true).await?;
        info!("Joined room {} as {}", room.room_name, room.identity);

        Ok((Box::new(room), rx))
    }

    fn name(&self) -> &str {
        "nats"
    }
}

struct MicrophoneTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl MicrophoneTask {
    /// False once the capture source has run dry (end of a replayed file)
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

struct NatsRoom {
    client: Client,
    subjects: RoomSubjects,
    room_name: String,
    identity: String,
    audio_source: AudioSource,
    audio_config: AudioBackendConfig,
    cancel: CancellationToken,
    forward_task: Option<JoinHandle<()>>,
    microphone: Option<MicrophoneTask>,
}

impl NatsRoom {
    async fn announce(&self, joined: bool) -> Result<(), ConnectionError> {
        let message = PresenceMessage {
            identity: self.identity.clone(),
            joined,
        };
        let payload = serde_json::to_vec(&message)
            .map_err(|e| transport_error("Failed to encode presence", e))?;

        self.client
            .publish(self.subjects.presence.clone(), payload.into())
            .await
            .map_err(|e| transport_error("Failed to publish presence", e))
    }

    async fn start_microphone(&mut self) -> Result<(), DeviceError> {
        let mut backend =
            AudioBackendFactory::create(self.audio_source.clone(), self.audio_config.clone())?;
        let mut audio_rx = backend.start().await?;

        info!("Publishing microphone via {} backend", backend.name());

        let client = self.client.clone();
        let subject = self.subjects.audio(&self.identity);
        let identity = self.identity.clone();
        let sample_rate = self.audio_config.target_sample_rate;
        let channels = self.audio_config.target_channels;
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut sequence: u32 = 0;

            loop {
                let frame = tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    frame = audio_rx.recv() => match frame {
                        Some(frame) => frame,
                        None => break,
                    },
                };

                let processed = process_frame(frame, sample_rate, channels);
                let message = audio_message(
                    &identity,
                    sequence,
                    &to_pcm_bytes(&processed.samples),
                    processed.sample_rate,
                    processed.channels,
                    false,
                );
                sequence = sequence.wrapping_add(1);

                if let Err(e) = publish_json(&client, &subject, &message).await {
                    error!("Failed to publish audio frame: {}", e);
                }
            }

            // End-of-stream marker so the agent can flush its buffers
            let last = audio_message(&identity, sequence, &[], sample_rate, channels, true);
            if let Err(e) = publish_json(&client, &subject, &last).await {
                error!("Failed to send final frame: {}", e);
            }

            if let Err(e) = backend.stop().await {
                error!("Failed to stop audio backend: {}", e);
            }
        });

        self.microphone = Some(MicrophoneTask { cancel, handle });
        Ok(())
    }

    /// Forget a capture task that ended on its own so it can be restarted
    fn microphone_running(&mut self) -> bool {
        if self.microphone.as_ref().is_some_and(|task| !task.is_running()) {
            debug!("Microphone capture ended, releasing it");
            self.microphone = None;
        }
        self.microphone.is_some()
    }

    async fn stop_microphone(&mut self) {
        if let Some(task) = self.microphone.take() {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                error!("Microphone task panicked: {}", e);
            }
        }
    }
}

fn audio_message(
    identity: &str,
    sequence: u32,
    pcm_bytes: &[u8],
    sample_rate: u32,
    channels: u16,
    final_frame: bool,
) -> AudioFrameMessage {
    AudioFrameMessage {
        identity: identity.to_string(),
        sequence,
        pcm: base64::engine::general_purpose::STANDARD.encode(pcm_bytes),
        sample_rate,
        channels,
        timestamp: chrono::Utc::now().to_rfc3339(),
        final_frame,
    }
}

async fn publish_json(client: &Client, subject: &str, message: &AudioFrameMessage) -> anyhow::Result<()> {
    let payload = serde_json::to_vec(message)?;
    client.publish(subject.to_string(), payload.into()).await?;
    Ok(())
}

#[async_trait::async_trait]
impl Room for NatsRoom {
    fn room_name(&self) -> &str {
        &self.room_name
    }

    fn local_identity(&self) -> &str {
        &self.identity
    }

    async fn disconnect(&mut self) -> Result<(), ConnectionError> {
        self.stop_microphone().await;

        let announced = self.announce(false).await;
        if let Err(e) = self.client.flush().await {
            warn!("Failed to flush NATS connection: {}", e);
        }

        self.cancel.cancel();
        if let Some(task) = self.forward_task.take() {
            if let Err(e) = task.await {
                error!("Room event task panicked: {}", e);
            }
        }

        info!("Left room {}", self.room_name);
        announced
    }

    async fn set_microphone_enabled(&mut self, enabled: bool) -> Result<(), DeviceError> {
        match (enabled, self.microphone_running()) {
            (true, false) => self.start_microphone().await,
            (false, true) => {
                self.stop_microphone().await;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl Drop for NatsRoom {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.microphone.take() {
            task.cancel.cancel();
        }
    }
}
