use thiserror::Error;

/// Errors surfaced to callers of [`VoiceSession`](crate::session::VoiceSession) operations
#[derive(Debug, Error)]
pub enum SessionError {
    /// Identity was empty, or differs from the identity the session already uses
    #[error("Invalid participant identity: {0}")]
    InvalidIdentity(String),

    /// Token acquisition or room connection failed
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Microphone could not be enabled or disabled
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Failure to reach the room
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to get token: {0}")]
    Token(#[from] TokenError),

    #[error("Transport rejected connection: {0}")]
    Transport(String),
}

/// Failure talking to the token service
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Token service returned {status}: {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

/// Microphone capture/publication failure
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No capture device (or no backend compiled in)
    #[error("No audio input device available: {0}")]
    Unavailable(String),

    /// The platform refused access to the device
    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("Audio capture failed: {0}")]
    Capture(String),
}

/// Malformed data-bus message. Always recovered locally.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Payload is not a valid envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Event '{event}' is missing data.text")]
    MissingText { event: String },
}
