use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use crate::error::DeviceError;
use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Split into frames of `frame_ms` milliseconds (last one may be shorter)
    pub fn frames(&self, frame_ms: u64) -> Vec<AudioFrame> {
        let channels = self.channels.max(1) as usize;
        let per_frame = ((self.sample_rate as u64 * frame_ms / 1000) as usize).max(1) * channels;

        self.samples
            .chunks(per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * frame_ms,
            })
            .collect()
    }
}

/// Replays a WAV file at real-time pace, standing in for a microphone
pub struct FileBackend {
    path: PathBuf,
    config: AudioBackendConfig,
    cancel: Option<CancellationToken>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>, config: AudioBackendConfig) -> Self {
        Self {
            path: path.into(),
            config,
            cancel: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, DeviceError> {
        if self.is_capturing() {
            return Err(DeviceError::Capture("capture already running".to_string()));
        }

        let file = AudioFile::open(&self.path)
            .map_err(|e| DeviceError::Unavailable(format!("{:#}", e)))?;
        let frame_ms = self.config.buffer_duration_ms.max(1);
        let frames = file.frames(frame_ms);

        let (tx, rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(frame_ms));
            for frame in frames {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("File playback finished");
        });

        self.cancel = Some(cancel);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), DeviceError> {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|c| !c.is_cancelled())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "file"
    }
}
