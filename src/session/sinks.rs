use crate::transport::ConnectionState;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, warn};

pub type TextSink = Arc<dyn Fn(&str) + Send + Sync>;
pub type StateSink = Arc<dyn Fn(ConnectionState) + Send + Sync>;
pub type PresenceSink = Arc<dyn Fn(bool) + Send + Sync>;

/// One callback per event kind. Registering again replaces the previous one.
#[derive(Default)]
pub(crate) struct Sinks {
    transcribed_text: RwLock<Option<TextSink>>,
    assistant_response: RwLock<Option<TextSink>>,
    connection_state: RwLock<Option<StateSink>>,
    agent_presence: RwLock<Option<PresenceSink>>,
}

fn register<T>(slot: &RwLock<Option<T>>, sink: T, kind: &str) {
    if slot.write().replace(sink).is_some() {
        warn!("Replacing previously registered {} sink", kind);
    }
}

/// Run a sink outside the lock; a panicking sink must not take the dispatcher down
fn invoke<T: ?Sized>(slot: &RwLock<Option<Arc<T>>>, kind: &str, call: impl FnOnce(&T)) {
    let sink = slot.read().clone();
    if let Some(sink) = sink {
        if catch_unwind(AssertUnwindSafe(|| call(&*sink))).is_err() {
            error!("{} sink panicked", kind);
        }
    }
}

impl Sinks {
    pub fn set_transcribed_text(&self, sink: TextSink) {
        register(&self.transcribed_text, sink, "transcribed-text");
    }

    pub fn set_assistant_response(&self, sink: TextSink) {
        register(&self.assistant_response, sink, "assistant-response");
    }

    pub fn set_connection_state(&self, sink: StateSink) {
        register(&self.connection_state, sink, "connection-state");
    }

    pub fn set_agent_presence(&self, sink: PresenceSink) {
        register(&self.agent_presence, sink, "agent-presence");
    }

    pub fn transcribed_text(&self, text: &str) {
        invoke(&self.transcribed_text, "transcribed-text", |sink| sink(text));
    }

    pub fn assistant_response(&self, text: &str) {
        invoke(&self.assistant_response, "assistant-response", |sink| sink(text));
    }

    pub fn connection_state(&self, state: ConnectionState) {
        invoke(&self.connection_state, "connection-state", |sink| sink(state));
    }

    pub fn agent_presence(&self, present: bool) {
        invoke(&self.agent_presence, "agent-presence", |sink| sink(present));
    }
}
