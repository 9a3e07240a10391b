pub mod backend;
pub mod convert;
pub mod file;

#[cfg(feature = "microphone")]
pub mod cpal;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use file::{AudioFile, FileBackend};
