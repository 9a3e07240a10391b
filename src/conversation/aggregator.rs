use super::turn::{ConversationTurn, Speaker, Transcript};
use crate::session::VoiceSession;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

const TURN_BUFFER: usize = 64;

#[derive(Default)]
struct Inner {
    transcript: Transcript,
    in_progress: HashMap<Speaker, String>,
}

/// Builds the transcript from a session's text events
///
/// One aggregator belongs to one session; a fresh session gets a fresh
/// aggregator, which is the only way the transcript is reset.
#[derive(Clone)]
pub struct ConversationAggregator {
    inner: Arc<Mutex<Inner>>,
    turns_tx: broadcast::Sender<ConversationTurn>,
}

impl Default for ConversationAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationAggregator {
    pub fn new() -> Self {
        let (turns_tx, _) = broadcast::channel(TURN_BUFFER);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            turns_tx,
        }
    }

    /// Register as the session's transcribed-text and assistant-response sinks
    pub fn attach(&self, session: &VoiceSession) {
        let user = self.clone();
        session.on_transcribed_text(move |text| {
            user.on_transcribed_text(text);
        });

        let assistant = self.clone();
        session.on_assistant_response(move |text| {
            assistant.on_assistant_response(text);
        });
    }

    pub fn on_transcribed_text(&self, text: &str) -> Option<ConversationTurn> {
        self.record(Speaker::User, text)
    }

    pub fn on_assistant_response(&self, text: &str) -> Option<ConversationTurn> {
        self.record(Speaker::Assistant, text)
    }

    /// Append a turn unless `text` is blank. Returns the appended turn.
    pub fn record(&self, speaker: Speaker, text: &str) -> Option<ConversationTurn> {
        if text.trim().is_empty() {
            debug!("Discarding blank {:?} text", speaker);
            return None;
        }

        let turn = ConversationTurn {
            speaker,
            text: text.to_string(),
            received_at: Utc::now(),
        };

        {
            let mut inner = self.inner.lock();
            inner.transcript.push(turn.clone());
            inner.in_progress.remove(&speaker);
        }

        // Nobody listening is fine
        let _ = self.turns_tx.send(turn.clone());
        Some(turn)
    }

    /// Show streaming text for `speaker` until their next turn is appended
    pub fn set_in_progress(&self, speaker: Speaker, text: &str) {
        let mut inner = self.inner.lock();
        if text.is_empty() {
            inner.in_progress.remove(&speaker);
        } else {
            inner.in_progress.insert(speaker, text.to_string());
        }
    }

    pub fn in_progress(&self, speaker: Speaker) -> Option<String> {
        self.inner.lock().in_progress.get(&speaker).cloned()
    }

    /// Snapshot of the transcript so far
    pub fn transcript(&self) -> Transcript {
        self.inner.lock().transcript.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receive every turn appended from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationTurn> {
        self.turns_tx.subscribe()
    }
}
