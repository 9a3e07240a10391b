use crate::error::DecodeError;
use serde::{Deserialize, Serialize};

/// Current data-bus schema version. Envelopes without a version are treated as v1.
pub const PROTOCOL_VERSION: u32 = 1;

const TRANSCRIBED_TEXT: &str = "transcribed_text";
const RESPONSE: &str = "response";

/// Kind of an application message on the data bus
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Speech-to-text result for the local user
    TranscribedText,
    /// Text of the agent's reply
    AssistantResponse,
    /// Any discriminator this client does not know about
    Other(String),
}

impl EventKind {
    pub fn from_wire(event: &str) -> Self {
        match event {
            TRANSCRIBED_TEXT => Self::TranscribedText,
            RESPONSE => Self::AssistantResponse,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            Self::TranscribedText => TRANSCRIBED_TEXT,
            Self::AssistantResponse => RESPONSE,
            Self::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

/// Decoded data-bus message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEnvelope {
    pub version: u32,
    pub kind: EventKind,
    pub text: String,
}

/// Wire shape: `{"event": "...", "data": {"text": "..."}, "version": 1}`
#[derive(Debug, Serialize, Deserialize)]
struct WireEnvelope {
    event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<u32>,
}

impl InboundEnvelope {
    pub fn new(kind: EventKind, text: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            kind,
            text: text.into(),
        }
    }

    pub fn transcribed_text(text: impl Into<String>) -> Self {
        Self::new(EventKind::TranscribedText, text)
    }

    pub fn assistant_response(text: impl Into<String>) -> Self {
        Self::new(EventKind::AssistantResponse, text)
    }

    /// Encode as the UTF-8 JSON payload the agent publishes
    pub fn to_bytes(&self) -> Vec<u8> {
        let wire = WireEnvelope {
            event: self.kind.as_wire().to_string(),
            data: Some(serde_json::json!({ "text": self.text })),
            version: Some(self.version),
        };
        // Only strings and numbers, serialization cannot fail
        serde_json::to_vec(&wire).unwrap_or_default()
    }
}

/// Decode a raw data-bus payload.
///
/// Known kinds must carry a string `data.text`. Unknown kinds are accepted
/// with whatever text they carry so newer agents don't break older clients.
pub fn decode(payload: &[u8]) -> Result<InboundEnvelope, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    let wire: WireEnvelope = serde_json::from_str(text)?;

    let kind = EventKind::from_wire(&wire.event);
    let payload_text = wire
        .data
        .as_ref()
        .and_then(|data| data.get("text"))
        .and_then(|value| value.as_str())
        .map(str::to_string);

    let text = match (payload_text, kind.is_known()) {
        (Some(text), _) => text,
        (None, false) => String::new(),
        (None, true) => return Err(DecodeError::MissingText { event: wire.event }),
    };

    Ok(InboundEnvelope {
        version: wire.version.unwrap_or(PROTOCOL_VERSION),
        kind,
        text,
    })
}
