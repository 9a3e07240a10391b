use crate::audio::{AudioBackendConfig, AudioSource};
use crate::session::SessionConfig;
use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub room: RoomConfig,
    pub token: TokenConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct RoomConfig {
    pub name: String,
    pub agent_identity: String,
    pub nats_url: String,
    #[serde(default = "default_auto_enable_audio")]
    pub auto_enable_audio: bool,
}

fn default_auto_enable_audio() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct TokenConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    /// "microphone" or "file"
    pub source: String,
    pub file_path: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_duration_ms: u64,
}

impl Config {
    /// Load `path` (any format the config crate knows), then `VOICE_ROOM__*` env overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("VOICE_ROOM").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            room_name: self.room.name.clone(),
            agent_identity: self.room.agent_identity.clone(),
            auto_enable_audio: self.room.auto_enable_audio,
        }
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.token.timeout_secs)
    }

    pub fn audio_source(&self) -> Result<AudioSource> {
        match self.audio.source.as_str() {
            "microphone" => Ok(AudioSource::Microphone),
            "file" => match &self.audio.file_path {
                Some(path) => Ok(AudioSource::File(PathBuf::from(path))),
                None => bail!("audio.source = \"file\" requires audio.file_path"),
            },
            other => bail!("Unknown audio source '{}'", other),
        }
    }

    pub fn audio_backend_config(&self) -> AudioBackendConfig {
        AudioBackendConfig {
            target_sample_rate: self.audio.sample_rate,
            target_channels: self.audio.channels,
            buffer_duration_ms: self.audio.buffer_duration_ms,
        }
    }
}
