//! Integration tests for the chat session engine, driven through a scripted
//! mock transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use blechat_core::{
    ChatError, ChatSession, LinkEvent, MessageRecord, MessageStore, Packet, PeerId,
    SessionConfig, SessionEvent, SessionState, Transport, TransportError,
};
use tempfile::TempDir;

// ----------------------------------------------------------------------------
// Mock Transport
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq)]
enum ConnectBehavior {
    Succeed,
    Fail,
    Hang,
}

/// Scripted transport: records outbound frames, connects (or fails, or
/// hangs) on demand, and can be told to fail every send.
struct MockTransport {
    connect_behavior: ConnectBehavior,
    fail_sends: bool,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    link_rx: Option<mpsc::UnboundedReceiver<LinkEvent>>,
    _link_tx: mpsc::UnboundedSender<LinkEvent>,
}

impl MockTransport {
    fn new(connect_behavior: ConnectBehavior) -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = Self {
            connect_behavior,
            fail_sends: false,
            sent: Arc::clone(&sent),
            link_rx: Some(link_rx),
            _link_tx: link_tx,
        };
        (transport, sent)
    }

    fn failing_sends(connect_behavior: ConnectBehavior) -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
        let (mut transport, sent) = Self::new(connect_behavior);
        transport.fail_sends = true;
        (transport, sent)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, peer: &PeerId) -> Result<(), TransportError> {
        match self.connect_behavior {
            ConnectBehavior::Succeed => Ok(()),
            ConnectBehavior::Fail => Err(TransportError::ConnectionFailed {
                peer: peer.to_string(),
                reason: "scripted failure".to_string(),
            }),
            ConnectBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    async fn send(&mut self, payload: Vec<u8>) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::SendFailed {
                reason: "scripted send failure".to_string(),
            });
        }
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }

    fn take_link_events(&mut self) -> Option<mpsc::UnboundedReceiver<LinkEvent>> {
        self.link_rx.take()
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------------

const PEER_ADDRESS: &str = "AA:BB:CC:DD:EE:FF";

fn test_store() -> (TempDir, Arc<MessageStore>) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MessageStore::open(dir.path().join("history.json")).unwrap());
    (dir, store)
}

fn peer() -> PeerId {
    PeerId::new(PEER_ADDRESS).unwrap()
}

fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn connected_session(
    store: Arc<MessageStore>,
) -> (
    ChatSession<MockTransport>,
    mpsc::UnboundedReceiver<SessionEvent>,
    Arc<Mutex<Vec<Vec<u8>>>>,
) {
    let (transport, sent) = MockTransport::new(ConnectBehavior::Succeed);
    let (mut session, events) =
        ChatSession::new(transport, store, "nick", SessionConfig::default());
    session.connect(peer()).await.unwrap();
    (session, events, sent)
}

// ----------------------------------------------------------------------------
// Connect / Disconnect
// ----------------------------------------------------------------------------

#[tokio::test]
async fn connect_failure_returns_to_disconnected() {
    let (_dir, store) = test_store();
    let (transport, _sent) = MockTransport::new(ConnectBehavior::Fail);
    let (mut session, _events) =
        ChatSession::new(transport, store, "nick", SessionConfig::default());

    let err = session.connect(peer()).await.unwrap_err();
    assert!(matches!(
        err,
        ChatError::Transport(TransportError::ConnectionFailed { .. })
    ));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn connect_timeout_passes_through() {
    let (_dir, store) = test_store();
    let (transport, _sent) = MockTransport::new(ConnectBehavior::Hang);
    let config = SessionConfig::default().with_connect_timeout(Duration::from_millis(20));
    let (mut session, _events) = ChatSession::new(transport, store, "nick", config);

    let err = session.connect(peer()).await.unwrap_err();
    assert!(matches!(
        err,
        ChatError::Transport(TransportError::Timeout { .. })
    ));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let (_dir, store) = test_store();
    let (mut session, mut events, _sent) = connected_session(store).await;

    session.disconnect().await.unwrap();
    session.disconnect().await.unwrap();
    assert_eq!(session.state(), SessionState::Disconnected);

    let closed = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event, SessionEvent::Closed))
        .count();
    assert_eq!(closed, 1);
}

#[tokio::test]
async fn connect_twice_is_rejected() {
    let (_dir, store) = test_store();
    let (mut session, _events, _sent) = connected_session(store).await;

    let err = session.connect(peer()).await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidState { .. }));
    assert_eq!(session.state(), SessionState::Connected);
}

// ----------------------------------------------------------------------------
// History Replay
// ----------------------------------------------------------------------------

#[tokio::test]
async fn history_replays_before_input_and_send_appends() {
    let (_dir, store) = test_store();

    // Stored history from a previous run.
    let stored = MessageRecord {
        sender: "Alice".to_string(),
        content: "hi".to_string(),
        timestamp: blechat_core::Timestamp::new(1_000),
        is_self: false,
    };
    store.append(&peer(), &stored).unwrap();

    let (mut session, mut events, _sent) = connected_session(Arc::clone(&store)).await;

    let replayed = drain(&mut events);
    assert!(matches!(replayed[0], SessionEvent::Connected { .. }));
    match &replayed[1] {
        SessionEvent::HistoryReplayed(records) => {
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].sender, "Alice");
            assert_eq!(records[0].content, "hi");
            assert!(!records[0].is_self);
        }
        other => panic!("expected history replay, got {other:?}"),
    }

    session.send_text("hello").await.unwrap();

    let log = store.load(&peer());
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].sender, "nick");
    assert_eq!(log[1].content, "hello");
    assert!(log[1].is_self);
}

// ----------------------------------------------------------------------------
// Sending
// ----------------------------------------------------------------------------

#[tokio::test]
async fn whitespace_send_produces_no_record_and_no_transport_call() {
    let (_dir, store) = test_store();
    let (mut session, _events, sent) = connected_session(Arc::clone(&store)).await;

    let result = session.send_text("   ").await.unwrap();
    assert!(result.is_none());
    assert!(sent.lock().unwrap().is_empty());
    assert!(store.load(&peer()).is_empty());
}

#[tokio::test]
async fn send_trims_surrounding_whitespace() {
    let (_dir, store) = test_store();
    let (mut session, _events, sent) = connected_session(Arc::clone(&store)).await;

    let record = session.send_text("  hello  ").await.unwrap().unwrap();
    assert_eq!(record.content, "hello");

    let frames = sent.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(
        Packet::decode(&frames[0]).unwrap(),
        Packet::Message {
            content: "hello".to_string()
        }
    );
}

#[tokio::test]
async fn send_while_disconnected_is_rejected_without_side_effects() {
    let (_dir, store) = test_store();
    let (transport, sent) = MockTransport::new(ConnectBehavior::Succeed);
    let (mut session, _events) =
        ChatSession::new(transport, Arc::clone(&store), "nick", SessionConfig::default());

    let err = session.send_text("hello").await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidState { .. }));
    assert!(sent.lock().unwrap().is_empty());
    assert!(store.load(&peer()).is_empty());
}

#[tokio::test]
async fn send_failure_drops_connection_but_keeps_echo() {
    let (_dir, store) = test_store();
    let (transport, _sent) = MockTransport::failing_sends(ConnectBehavior::Succeed);
    let (mut session, mut events) =
        ChatSession::new(transport, Arc::clone(&store), "nick", SessionConfig::default());
    session.connect(peer()).await.unwrap();
    drain(&mut events);

    let err = session.send_text("hello").await.unwrap_err();
    assert!(matches!(
        err,
        ChatError::Transport(TransportError::SendFailed { .. })
    ));
    assert_eq!(session.state(), SessionState::Disconnected);

    // The local echo is truthful and stays persisted.
    let log = store.load(&peer());
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].content, "hello");

    let events = drain(&mut events);
    assert!(events
        .iter()
        .any(|event| matches!(event, SessionEvent::MessageSent(_))));
    assert!(events
        .iter()
        .any(|event| matches!(event, SessionEvent::ConnectionLost { .. })));
}

// ----------------------------------------------------------------------------
// Typing Status
// ----------------------------------------------------------------------------

#[tokio::test]
async fn typing_deduplicates_consecutive_states() {
    let (_dir, store) = test_store();
    let (mut session, _events, sent) = connected_session(store).await;

    session.set_typing(true).await.unwrap();
    session.set_typing(true).await.unwrap();
    assert_eq!(sent.lock().unwrap().len(), 1);

    session.set_typing(false).await.unwrap();
    let frames = sent.lock().unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(
        Packet::decode(&frames[1]).unwrap(),
        Packet::Typing { active: false }
    );
}

#[tokio::test]
async fn typing_outside_connected_is_rejected() {
    let (_dir, store) = test_store();
    let (transport, _sent) = MockTransport::new(ConnectBehavior::Succeed);
    let (mut session, _events) =
        ChatSession::new(transport, store, "nick", SessionConfig::default());

    let err = session.set_typing(true).await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidState { .. }));
}

#[tokio::test]
async fn inbound_typing_is_surfaced_but_never_persisted() {
    let (_dir, store) = test_store();
    let (mut session, mut events, _sent) = connected_session(Arc::clone(&store)).await;
    drain(&mut events);

    session
        .on_packet_received(br#"{"type": "typing", "content": true}"#)
        .unwrap();

    let events = drain(&mut events);
    assert!(matches!(events[0], SessionEvent::PeerTyping(true)));
    assert!(store.load(&peer()).is_empty());
}

// ----------------------------------------------------------------------------
// Inbound Messages
// ----------------------------------------------------------------------------

#[tokio::test]
async fn inbound_message_persists_and_notifies() {
    let (_dir, store) = test_store();
    let (mut session, mut events, _sent) = connected_session(Arc::clone(&store)).await;
    drain(&mut events);

    session
        .on_packet_received(br#"{"type": "message", "content": "hey there"}"#)
        .unwrap();

    let log = store.load(&peer());
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].content, "hey there");
    assert!(!log[0].is_self);
    assert_eq!(log[0].sender, PEER_ADDRESS);

    let events = drain(&mut events);
    assert!(matches!(events[0], SessionEvent::MessageReceived(_)));
}

#[tokio::test]
async fn unknown_tag_keeps_log_and_state_unchanged() {
    let (_dir, store) = test_store();
    let (mut session, mut events, _sent) = connected_session(Arc::clone(&store)).await;
    drain(&mut events);

    session
        .on_packet_received(br#"{"type": "presence", "content": true}"#)
        .unwrap();

    assert_eq!(session.state(), SessionState::Connected);
    assert!(store.load(&peer()).is_empty());
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn undecodable_frames_are_dropped_silently() {
    let (_dir, store) = test_store();
    let (mut session, mut events, _sent) = connected_session(Arc::clone(&store)).await;
    drain(&mut events);

    session.on_packet_received(&[0xff, 0xfe]).unwrap();
    session.on_packet_received(b"{\"type\": \"message\"").unwrap();
    session
        .on_packet_received(br#"{"type": "message", "content": 7}"#)
        .unwrap();

    assert_eq!(session.state(), SessionState::Connected);
    assert!(store.load(&peer()).is_empty());
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn empty_inbound_message_is_not_persisted() {
    let (_dir, store) = test_store();
    let (mut session, mut events, _sent) = connected_session(Arc::clone(&store)).await;
    drain(&mut events);

    session
        .on_packet_received(br#"{"type": "message", "content": "   "}"#)
        .unwrap();

    assert!(store.load(&peer()).is_empty());
    assert!(drain(&mut events).is_empty());
}

// ----------------------------------------------------------------------------
// Link Loss
// ----------------------------------------------------------------------------

#[tokio::test]
async fn transport_loss_moves_session_to_disconnected() {
    let (_dir, store) = test_store();
    let (mut session, mut events, _sent) = connected_session(store).await;
    drain(&mut events);

    session.on_disconnected("peer went away");
    assert_eq!(session.state(), SessionState::Disconnected);

    let emitted = drain(&mut events);
    assert!(matches!(
        &emitted[0],
        SessionEvent::ConnectionLost { reason } if reason == "peer went away"
    ));

    // A second loss notification is a no-op.
    session.on_disconnected("again");
    assert!(drain(&mut events).is_empty());
}
