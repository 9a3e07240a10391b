//! Default input device capture through CPAL

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use crate::error::DeviceError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, SampleFormat};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

pub struct CpalBackend {
    config: AudioBackendConfig,
    is_capturing: Arc<AtomicBool>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl CpalBackend {
    pub fn new(config: AudioBackendConfig) -> Result<Self, DeviceError> {
        // Fail early when the host has no input device at all
        cpal::default_host()
            .default_input_device()
            .ok_or_else(|| DeviceError::Unavailable("no default input device".to_string()))?;

        Ok(Self {
            config,
            is_capturing: Arc::new(AtomicBool::new(false)),
            shutdown_tx: None,
        })
    }
}

fn map_build_error(e: BuildStreamError) -> DeviceError {
    match e {
        BuildStreamError::DeviceNotAvailable => {
            DeviceError::Unavailable("input device disappeared".to_string())
        }
        other => DeviceError::Capture(other.to_string()),
    }
}

#[async_trait::async_trait]
impl AudioBackend for CpalBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, DeviceError> {
        if self.is_capturing() {
            return Err(DeviceError::Capture("capture already running".to_string()));
        }

        let (tx, rx) = mpsc::channel(256);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), DeviceError>>();
        let is_capturing = Arc::clone(&self.is_capturing);
        let buffer_ms = self.config.buffer_duration_ms;

        // CPAL streams are not Send, so the stream lives on its own thread
        std::thread::spawn(move || {
            let device = match cpal::default_host().default_input_device() {
                Some(d) => d,
                None => {
                    let _ = ready_tx.send(Err(DeviceError::Unavailable(
                        "no default input device".to_string(),
                    )));
                    return;
                }
            };

            let supported = match device.default_input_config() {
                Ok(c) => c,
                Err(e) => {
                    let _ = ready_tx.send(Err(DeviceError::PermissionDenied(e.to_string())));
                    return;
                }
            };

            let sample_rate = supported.sample_rate().0;
            let channels = supported.channels();
            let sample_format = supported.sample_format();
            let stream_config: cpal::StreamConfig = supported.config();
            let started = Instant::now();
            let frame_len = (sample_rate as u64 * buffer_ms / 1000) as usize * channels as usize;

            let mut pending: Vec<i16> = Vec::with_capacity(frame_len.max(1));
            let mut push = move |samples: &mut dyn Iterator<Item = i16>| {
                pending.extend(samples);
                if pending.len() >= frame_len {
                    let frame = AudioFrame {
                        samples: std::mem::take(&mut pending),
                        sample_rate,
                        channels,
                        timestamp_ms: started.elapsed().as_millis() as u64,
                    };
                    if let Err(e) = tx.try_send(frame) {
                        warn!("Dropping microphone frame: {}", e);
                    }
                }
            };

            let on_error = |err: cpal::StreamError| error!("Microphone stream error: {}", err);

            let stream = match sample_format {
                SampleFormat::F32 => device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        push(&mut data.iter().map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16));
                    },
                    on_error,
                    None,
                ),
                SampleFormat::I16 => device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        push(&mut data.iter().copied());
                    },
                    on_error,
                    None,
                ),
                other => {
                    let _ = ready_tx.send(Err(DeviceError::Capture(format!(
                        "unsupported sample format {:?}",
                        other
                    ))));
                    return;
                }
            };

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(map_build_error(e)));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(DeviceError::Capture(e.to_string())));
                return;
            }

            info!("Microphone capture started ({}Hz, {} channels)", sample_rate, channels);
            is_capturing.store(true, Ordering::SeqCst);
            let _ = ready_tx.send(Ok(()));

            // Dropping the stream at the end of this thread stops capture
            let _ = shutdown_rx.blocking_recv();
            is_capturing.store(false, Ordering::SeqCst);
            info!("Microphone capture stopped");
        });

        ready_rx
            .await
            .map_err(|_| DeviceError::Capture("capture thread exited".to_string()))??;

        self.shutdown_tx = Some(shutdown_tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), DeviceError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "cpal"
    }
}
