use crate::error::DeviceError;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for audio backend
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Sample rate published to the room (frames are downsampled to it)
    pub target_sample_rate: u32,
    /// Channel count published to the room (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Buffer size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // what the agent's STT expects
            target_channels: 1,        // Mono
            buffer_duration_ms: 100,   // 100ms buffers
        }
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - `FileBackend`: replays a WAV file in real time (virtual microphone)
/// - `CpalBackend`: default input device (`microphone` feature)
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, DeviceError>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<(), DeviceError>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio source type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Default input device
    Microphone,
    /// WAV file replayed as if it were spoken into a microphone
    File(PathBuf),
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create the capture backend for `source`
    pub fn create(
        source: AudioSource,
        config: AudioBackendConfig,
    ) -> Result<Box<dyn AudioBackend>, DeviceError> {
        match source {
            AudioSource::Microphone => {
                #[cfg(feature = "microphone")]
                {
                    let backend = super::cpal::CpalBackend::new(config)?;
                    Ok(Box::new(backend))
                }

                #[cfg(not(feature = "microphone"))]
                {
                    let _ = config;
                    Err(DeviceError::Unavailable(
                        "built without the `microphone` feature".to_string(),
                    ))
                }
            }

            AudioSource::File(path) => Ok(Box::new(super::file::FileBackend::new(path, config))),
        }
    }
}
