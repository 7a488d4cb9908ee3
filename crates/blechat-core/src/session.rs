//! Chat session state machine
//!
//! A [`ChatSession`] owns the transport and a handle to the history store.
//! It turns inbound frames into store writes and [`SessionEvent`]s, and user
//! actions into outbound frames:
//!
//! ```text
//! Disconnected --connect(peer)--> Connecting --on_connected--> Connected
//! Connecting --on_connect_failed--> Disconnected
//! Connected --on_disconnected / send_failure--> Disconnected
//! Connected --user_quit--> Closing --on_closed--> Disconnected
//! ```
//!
//! Every operation takes `&mut self`: the caller drives the session from one
//! serialized context, merging inbound link events and user input into a
//! single loop so the store is never entered from two directions at once.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::errors::{ChatError, Result, TransportError};
use crate::packet::Packet;
use crate::store::{MessageRecord, MessageStore};
use crate::transport::{LinkEvent, Transport};
use crate::types::PeerId;

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// Connection lifecycle state of a [`ChatSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Closing => "closing",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Session Events
// ----------------------------------------------------------------------------

/// Typed notifications published to the UI over the session event channel.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The link to the peer is established.
    Connected { peer: PeerId },
    /// Stored history for the peer, replayed in chronological order before
    /// any new input is accepted.
    HistoryReplayed(Vec<MessageRecord>),
    /// A locally sent message was persisted (local echo).
    MessageSent(MessageRecord),
    /// A message from the peer was persisted.
    MessageReceived(MessageRecord),
    /// The peer's typing status changed. Never persisted.
    PeerTyping(bool),
    /// The link dropped, or a send failed and cost the connection.
    ConnectionLost { reason: String },
    /// The session was closed locally.
    Closed,
}

// ----------------------------------------------------------------------------
// Chat Session
// ----------------------------------------------------------------------------

/// The session engine: one peer, one connection lifecycle, one event stream.
pub struct ChatSession<T: Transport> {
    transport: T,
    store: Arc<MessageStore>,
    config: SessionConfig,
    nickname: String,
    state: SessionState,
    peer: Option<PeerId>,
    last_typing_sent: Option<bool>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<T: Transport> ChatSession<T> {
    /// Create a session and the receiving end of its event channel.
    pub fn new(
        transport: T,
        store: Arc<MessageStore>,
        nickname: impl Into<String>,
        config: SessionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let session = Self {
            transport,
            store,
            config,
            nickname: nickname.into(),
            state: SessionState::Disconnected,
            peer: None,
            last_typing_sent: None,
            events,
        };
        (session, events_rx)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The peer this session talks to, once `connect` has been called.
    pub fn peer(&self) -> Option<&PeerId> {
        self.peer.as_ref()
    }

    /// The local nickname used for sent records.
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Take the single-consumer stream of raw link events from the
    /// transport. The driver feeds `Inbound` payloads back through
    /// [`ChatSession::on_packet_received`].
    pub fn take_link_events(&mut self) -> Option<mpsc::UnboundedReceiver<LinkEvent>> {
        self.transport.take_link_events()
    }

    /// Establish the link and replay stored history.
    ///
    /// Applies the configured connect timeout around the adapter's own
    /// limits. On failure the session returns to `Disconnected` and the
    /// error is retryable. On success the peer's stored log is emitted as
    /// [`SessionEvent::HistoryReplayed`] before any new input is accepted.
    pub async fn connect(&mut self, peer: PeerId) -> Result<()> {
        if self.state != SessionState::Disconnected {
            return Err(ChatError::invalid_state("connect", self.state));
        }
        self.state = SessionState::Connecting;
        info!(peer = %peer, "connecting");

        let connected = match self.config.connect_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.transport.connect(&peer)).await
            {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout {
                    duration_ms: limit.as_millis() as u64,
                }),
            },
            None => self.transport.connect(&peer).await,
        };

        if let Err(err) = connected {
            self.state = SessionState::Disconnected;
            warn!(peer = %peer, error = %err, "connect failed");
            return Err(ChatError::Transport(err));
        }

        self.state = SessionState::Connected;
        self.last_typing_sent = None;
        self.peer = Some(peer.clone());
        self.emit(SessionEvent::Connected { peer: peer.clone() });

        let history = self.store.load(&peer);
        self.emit(SessionEvent::HistoryReplayed(history));
        Ok(())
    }

    /// Send user text.
    ///
    /// Whitespace-only input produces no record and no transport call and
    /// returns `Ok(None)`. Otherwise the local echo record is persisted and
    /// emitted before the radio write — it is truthful even when the write
    /// then fails, so a transport failure costs the connection, not the
    /// record.
    pub async fn send_text(&mut self, content: &str) -> Result<Option<MessageRecord>> {
        if self.state != SessionState::Connected {
            return Err(ChatError::invalid_state("send_text", self.state));
        }
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let peer = self.current_peer("send_text")?;
        let record = MessageRecord::now(self.nickname.clone(), trimmed, true);
        self.store.append(&peer, &record)?;
        self.emit(SessionEvent::MessageSent(record.clone()));

        let payload = Packet::Message {
            content: trimmed.to_string(),
        }
        .encode();
        if let Err(err) = self.transport.send(payload).await {
            self.lose_connection(err.to_string());
            return Err(ChatError::Transport(err));
        }
        Ok(Some(record))
    }

    /// Send a typing status change.
    ///
    /// Consecutive identical states are de-duplicated: the packet is not
    /// resent while the last sent state already matches. Typing status is
    /// never persisted.
    pub async fn set_typing(&mut self, active: bool) -> Result<()> {
        if self.state != SessionState::Connected {
            return Err(ChatError::invalid_state("set_typing", self.state));
        }
        if self.last_typing_sent == Some(active) {
            return Ok(());
        }

        let payload = Packet::Typing { active }.encode();
        if let Err(err) = self.transport.send(payload).await {
            self.lose_connection(err.to_string());
            return Err(ChatError::Transport(err));
        }
        self.last_typing_sent = Some(active);
        Ok(())
    }

    /// Handle one inbound frame.
    ///
    /// Decode failures — malformed frames and unknown tags alike — are
    /// logged and dropped; the session stays connected and the stored log is
    /// untouched. Frames arriving outside `Connected` are ignored.
    pub fn on_packet_received(&mut self, bytes: &[u8]) -> Result<()> {
        if self.state != SessionState::Connected {
            debug!(state = %self.state, "dropping inbound frame outside connected state");
            return Ok(());
        }

        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(err) => {
                debug!(error = %err, "dropping undecodable frame");
                return Ok(());
            }
        };

        match packet {
            Packet::Message { content } => {
                if content.trim().is_empty() {
                    debug!("dropping inbound message with empty content");
                    return Ok(());
                }
                let peer = self.current_peer("on_packet_received")?;
                let record = MessageRecord::now(self.peer_label(), content, false);
                self.store.append(&peer, &record)?;
                self.emit(SessionEvent::MessageReceived(record));
            }
            Packet::Typing { active } => {
                self.emit(SessionEvent::PeerTyping(active));
            }
        }
        Ok(())
    }

    /// Transport-initiated connection loss. Safe in any state.
    pub fn on_disconnected(&mut self, reason: impl Into<String>) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.lose_connection(reason.into());
    }

    /// Close the session.
    ///
    /// Valid from any state and idempotent. Transitions through `Closing`,
    /// releases the adapter's channel, and ends `Disconnected`. Safe to call
    /// while a send is in flight; the pending send fails rather than hangs.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.state == SessionState::Disconnected {
            return Ok(());
        }
        self.state = SessionState::Closing;

        if let Err(err) = self.transport.disconnect().await {
            warn!(error = %err, "transport disconnect reported an error");
        }

        self.state = SessionState::Disconnected;
        self.last_typing_sent = None;
        self.emit(SessionEvent::Closed);
        Ok(())
    }

    fn current_peer(&self, operation: &'static str) -> Result<PeerId> {
        self.peer
            .clone()
            .ok_or(ChatError::invalid_state(operation, self.state))
    }

    fn peer_label(&self) -> String {
        self.config
            .peer_label
            .clone()
            .or_else(|| self.peer.as_ref().map(|p| p.to_string()))
            .unwrap_or_else(|| "peer".to_string())
    }

    fn lose_connection(&mut self, reason: String) {
        warn!(reason = %reason, "connection lost");
        self.state = SessionState::Disconnected;
        self.last_typing_sent = None;
        self.emit(SessionEvent::ConnectionLost { reason });
    }

    fn emit(&self, event: SessionEvent) {
        // The receiver may already be gone during shutdown.
        let _ = self.events.send(event);
    }
}
