// Integration tests for the voice session state machine
//
// The room is the in-process transport; the token service is a mock that
// counts requests and can be told to fail.

mod common;

use common::{eventually, harness, harness_with, settle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use voice_room::error::{ConnectionError, SessionError};
use voice_room::protocol::InboundEnvelope;
use voice_room::session::DEFAULT_ROOM_NAME;
use voice_room::{ConnectionState, SessionConfig};

fn record_states(h: &common::Harness) -> Arc<Mutex<Vec<ConnectionState>>> {
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&states);
    h.session
        .on_connection_state_changed(move |state| sink.lock().push(state));
    states
}

#[tokio::test]
async fn test_connect_joins_room_and_enables_microphone() {
    let h = harness();

    h.session.connect("user-1").await.unwrap();

    assert!(h.session.is_connected());
    assert!(h.session.microphone_enabled());
    assert!(h.room.microphone_enabled());
    assert_eq!(h.session.local_identity(), Some("user-1"));

    let request = h.room.last_request().expect("connector was called");
    assert_eq!(request.room_name, DEFAULT_ROOM_NAME);
    assert_eq!(request.identity, "user-1");
    assert_eq!(request.token, "token-for-user-1");
}

#[tokio::test]
async fn test_connect_without_auto_audio_leaves_microphone_off() {
    let h = harness_with(SessionConfig {
        auto_enable_audio: false,
        ..SessionConfig::default()
    });

    h.session.connect("user-1").await.unwrap();

    assert!(h.session.is_connected());
    assert!(!h.session.microphone_enabled());
}

#[tokio::test]
async fn test_connect_when_connected_is_noop() {
    let h = harness();

    h.session.connect("user-1").await.unwrap();
    h.session.connect("user-1").await.unwrap();

    assert_eq!(h.tokens.calls(), 1, "no second token request");
    assert_eq!(h.room.connect_calls(), 1);
    assert!(h.session.is_connected());
}

#[tokio::test]
async fn test_connect_while_reconnecting_is_noop() {
    let h = harness();
    h.session.connect("user-1").await.unwrap();

    h.room.set_state(ConnectionState::Reconnecting).await;
    eventually(|| h.session.state() == ConnectionState::Reconnecting).await;

    h.session.connect("user-1").await.unwrap();
    assert_eq!(h.tokens.calls(), 1);
}

#[tokio::test]
async fn test_token_failure_leaves_session_disconnected() {
    let h = harness();
    let states = record_states(&h);
    h.tokens.set_failing(true);

    let err = h.session.connect("user-1").await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Connection(ConnectionError::Token(_))
    ));
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    assert!(!h.session.microphone_enabled());
    assert_eq!(h.room.connect_calls(), 0, "transport never contacted");
    assert_eq!(
        *states.lock(),
        vec![ConnectionState::Connecting, ConnectionState::Disconnected]
    );

    // Usable for a retry
    h.tokens.set_failing(false);
    h.session.connect("user-1").await.unwrap();
    assert!(h.session.is_connected());
}

#[tokio::test]
async fn test_transport_rejection_leaves_session_disconnected() {
    let h = harness();
    h.room.reject_next_connect("invalid token");

    let err = h.session.connect("user-1").await.unwrap_err();

    match err {
        SessionError::Connection(ConnectionError::Transport(reason)) => {
            assert_eq!(reason, "invalid token")
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    assert!(!h.session.microphone_enabled());

    // A disconnect after a failed connect is harmless
    h.session.disconnect().await;
    assert_eq!(h.room.disconnect_calls(), 0);
}

#[tokio::test]
async fn test_empty_identity_is_rejected() {
    let h = harness();

    for identity in ["", "   "] {
        let err = h.session.connect(identity).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidIdentity(_)));
    }

    assert_eq!(h.tokens.calls(), 0);
    assert_eq!(h.session.local_identity(), None);
}

#[tokio::test]
async fn test_identity_is_fixed_after_first_connect() {
    let h = harness();
    h.session.connect("user-1").await.unwrap();
    h.session.disconnect().await;

    let err = h.session.connect("user-2").await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidIdentity(_)));

    h.session.connect("user-1").await.unwrap();
    assert!(h.session.is_connected());
}

#[tokio::test]
async fn test_disconnect_when_disconnected_is_noop() {
    let h = harness();
    let states = record_states(&h);

    h.session.disconnect().await;
    h.session.disconnect().await;

    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    assert!(states.lock().is_empty(), "no state change reported");
}

#[tokio::test]
async fn test_disconnect_tears_down_room() {
    let h = harness();
    h.session.connect("user-1").await.unwrap();

    h.session.disconnect().await;

    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    assert!(!h.session.microphone_enabled());
    assert!(!h.room.is_open());
    assert_eq!(h.room.disconnect_calls(), 1);

    h.session.disconnect().await;
    assert_eq!(h.room.disconnect_calls(), 1);
}

#[tokio::test]
async fn test_state_changes_are_reported_in_order() {
    let h = harness();
    let states = record_states(&h);

    h.session.connect("user-1").await.unwrap();
    h.room.set_state(ConnectionState::Reconnecting).await;
    h.room.set_state(ConnectionState::Connected).await;
    eventually(|| states.lock().len() == 4).await;
    h.session.disconnect().await;

    assert_eq!(
        *states.lock(),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
            ConnectionState::Connected,
            ConnectionState::Disconnecting,
            ConnectionState::Disconnected,
        ]
    );
}

#[tokio::test]
async fn test_repeated_transport_state_is_reported_once() {
    let h = harness();
    h.session.connect("user-1").await.unwrap();
    let states = record_states(&h);

    h.room.set_state(ConnectionState::Connected).await;
    h.room.set_state(ConnectionState::Reconnecting).await;
    eventually(|| h.session.state() == ConnectionState::Reconnecting).await;

    assert_eq!(*states.lock(), vec![ConnectionState::Reconnecting]);
}

#[tokio::test]
async fn test_enable_audio_without_connection_is_noop() {
    let h = harness();

    h.session.enable_audio().await.unwrap();
    h.session.disable_audio().await.unwrap();

    assert!(!h.session.microphone_enabled());
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_toggle_microphone() {
    let h = harness();
    h.session.connect("user-1").await.unwrap();

    h.session.disable_audio().await.unwrap();
    assert!(!h.session.microphone_enabled());
    assert!(!h.room.microphone_enabled());

    h.session.enable_audio().await.unwrap();
    assert!(h.session.microphone_enabled());
    assert!(h.room.microphone_enabled());
}

#[tokio::test]
async fn test_microphone_denied_during_connect() {
    let h = harness();
    h.room.deny_microphone(Some("permission denied by user"));

    let err = h.session.connect("user-1").await.unwrap_err();

    assert!(matches!(err, SessionError::Device(_)));
    assert!(h.session.is_connected(), "room stays joined");
    assert!(!h.session.microphone_enabled());

    h.room.deny_microphone(None);
    h.session.enable_audio().await.unwrap();
    assert!(h.session.microphone_enabled());
}

#[tokio::test]
async fn test_device_failure_does_not_change_state() {
    let h = harness();
    h.session.connect("user-1").await.unwrap();
    h.session.disable_audio().await.unwrap();
    let states = record_states(&h);

    h.room.deny_microphone(Some("no input device"));
    let err = h.session.enable_audio().await.unwrap_err();

    assert!(matches!(err, SessionError::Device(_)));
    assert_eq!(h.session.state(), ConnectionState::Connected);
    assert!(states.lock().is_empty());
}

#[tokio::test]
async fn test_transport_drop_clears_microphone_and_allows_reconnect() {
    let h = harness();
    h.session.connect("user-1").await.unwrap();

    h.room.set_state(ConnectionState::Disconnected).await;
    eventually(|| h.session.state() == ConnectionState::Disconnected).await;
    assert!(!h.session.microphone_enabled());

    // Dropped room: microphone changes are ignored
    h.session.enable_audio().await.unwrap();
    assert!(!h.session.microphone_enabled());

    h.session.connect("user-1").await.unwrap();
    assert!(h.session.is_connected());
    assert_eq!(h.tokens.calls(), 2);
    assert_eq!(h.room.connect_calls(), 2);
}

#[tokio::test]
async fn test_agent_presence_is_signalled_without_state_change() {
    let h = harness();
    let presence = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&presence);
    h.session.on_agent_presence(move |present| sink.lock().push(present));

    h.session.connect("user-1").await.unwrap();
    let states = record_states(&h);

    h.room.participant_joined("someone-else").await;
    h.room.participant_joined("python-agent").await;
    eventually(|| h.session.agent_present()).await;
    h.room.participant_left("python-agent").await;
    eventually(|| !h.session.agent_present()).await;

    assert_eq!(*presence.lock(), vec![true, false]);
    assert!(states.lock().is_empty());
    assert!(h.session.is_connected());
}

#[tokio::test]
async fn test_data_messages_are_dispatched_by_kind() {
    let h = harness();
    let user = Arc::new(Mutex::new(Vec::new()));
    let assistant = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&user);
    h.session
        .on_transcribed_text(move |text| sink.lock().push(text.to_string()));
    let sink = Arc::clone(&assistant);
    h.session
        .on_assistant_response(move |text| sink.lock().push(text.to_string()));

    h.session.connect("user-1").await.unwrap();

    h.room
        .send_envelope(&InboundEnvelope::transcribed_text("hello"))
        .await;
    h.room
        .send_data(r#"{"event":"agent_state","data":{"text":"thinking"}}"#, Some("python-agent"))
        .await;
    h.room
        .send_data(r#"{"event":"response","data":{"text":"hi there"}}"#, Some("python-agent"))
        .await;

    eventually(|| assistant.lock().len() == 1).await;
    assert_eq!(*user.lock(), vec!["hello".to_string()]);
    assert_eq!(*assistant.lock(), vec!["hi there".to_string()]);
}

#[tokio::test]
async fn test_malformed_messages_do_not_stop_dispatch() {
    let h = harness();
    let user = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&user);
    h.session
        .on_transcribed_text(move |text| sink.lock().push(text.to_string()));

    h.session.connect("user-1").await.unwrap();

    h.room.send_data(vec![0xff, 0xfe, 0xfd], None).await;
    h.room.send_data("not json", None).await;
    h.room
        .send_data(r#"{"event":"transcribed_text","data":{}}"#, None)
        .await;
    h.room
        .send_data(r#"{"event":"transcribed_text","data":{"text":"still here"}}"#, None)
        .await;

    eventually(|| !user.lock().is_empty()).await;
    settle().await;
    assert_eq!(*user.lock(), vec!["still here".to_string()]);
}

#[tokio::test]
async fn test_panicking_sink_does_not_stop_dispatch() {
    let h = harness();
    let states = record_states(&h);
    h.session.on_transcribed_text(|_| panic!("presentation bug"));

    h.session.connect("user-1").await.unwrap();
    h.room
        .send_envelope(&InboundEnvelope::transcribed_text("boom"))
        .await;
    h.room.set_state(ConnectionState::Reconnecting).await;

    eventually(|| h.session.state() == ConnectionState::Reconnecting).await;
    assert_eq!(states.lock().last(), Some(&ConnectionState::Reconnecting));
}

#[tokio::test]
async fn test_events_after_disconnect_are_not_delivered() {
    let h = harness();
    let user = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&user);
    h.session
        .on_transcribed_text(move |text| sink.lock().push(text.to_string()));

    h.session.connect("user-1").await.unwrap();
    h.session.disconnect().await;

    let delivered = h
        .room
        .send_envelope(&InboundEnvelope::transcribed_text("late"))
        .await;
    settle().await;

    assert!(!delivered);
    assert!(user.lock().is_empty());
}

#[tokio::test]
async fn test_status_snapshot() {
    let h = harness();
    let status = h.session.status();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert_eq!(status.local_identity, None);
    assert_eq!(status.room_name, DEFAULT_ROOM_NAME);

    h.session.connect("user-7").await.unwrap();
    let status = h.session.status();
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(status.local_identity.as_deref(), Some("user-7"));
    assert!(status.microphone_enabled);
    assert!(!status.agent_present);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_queued_events_are_dropped_after_disconnect() {
    let h = harness();
    let states = record_states(&h);
    let in_sink = Arc::new(AtomicBool::new(false));

    let entered = Arc::clone(&in_sink);
    h.session.on_transcribed_text(move |_| {
        entered.store(true, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(300));
    });

    h.session.connect("user-1").await.unwrap();
    h.room
        .send_envelope(&InboundEnvelope::transcribed_text("slow"))
        .await;
    h.room.set_state(ConnectionState::Reconnecting).await;
    eventually(|| in_sink.load(Ordering::SeqCst)).await;

    h.session.disconnect().await;
    assert_eq!(h.session.state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    assert_eq!(
        *states.lock(),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnecting,
            ConnectionState::Disconnected,
        ]
    );
}

#[tokio::test]
async fn test_transport_drop_clears_agent_presence() {
    let h = harness();
    h.session.connect("user-1").await.unwrap();

    h.room.participant_joined("python-agent").await;
    eventually(|| h.session.agent_present()).await;

    h.room.set_state(ConnectionState::Disconnected).await;
    eventually(|| h.session.state() == ConnectionState::Disconnected).await;

    let status = h.session.status();
    assert!(!status.agent_present);
    assert!(!status.microphone_enabled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_racing_connects_with_different_identities() {
    let h = harness();

    let (first, second) = tokio::join!(h.session.connect("user-1"), h.session.connect("user-2"));

    let winner = match (&first, &second) {
        (Ok(()), Err(SessionError::InvalidIdentity(_))) => "user-1",
        (Err(SessionError::InvalidIdentity(_)), Ok(())) => "user-2",
        other => panic!("expected one success and one identity error: {:?}", other),
    };
    assert_eq!(h.session.local_identity(), Some(winner));
    assert_eq!(h.room.connect_calls(), 1);
    assert_eq!(h.room.last_request().unwrap().identity, winner);
}
