#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use voice_room::error::TokenError;
use voice_room::{InMemoryConnector, RoomController, SessionConfig, TokenClient, TokenRequest, VoiceSession};

/// Token client that hands out `token-for-<identity>` or fails on demand
#[derive(Default)]
pub struct MockTokenClient {
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl MockTokenClient {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl TokenClient for MockTokenClient {
    async fn fetch_token(&self, request: &TokenRequest) -> Result<String, TokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TokenError::Rejected {
                status: 500,
                detail: "token service down".to_string(),
            });
        }
        Ok(format!("token-for-{}", request.participant_identity))
    }
}

pub struct Harness {
    pub session: Arc<VoiceSession>,
    pub tokens: Arc<MockTokenClient>,
    pub room: RoomController,
}

pub fn harness() -> Harness {
    harness_with(SessionConfig::default())
}

pub fn harness_with(config: SessionConfig) -> Harness {
    let tokens = Arc::new(MockTokenClient::default());
    let (connector, room) = InMemoryConnector::new();
    let session = Arc::new(VoiceSession::new(
        config,
        Arc::clone(&tokens) as Arc<dyn TokenClient>,
        Arc::new(connector),
    ));
    Harness {
        session,
        tokens,
        room,
    }
}

/// Wait up to a second for the session's dispatcher to catch up
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 1s");
}

/// Give the dispatcher time to process anything queued, for negative checks
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
