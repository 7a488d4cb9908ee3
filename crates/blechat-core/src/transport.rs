//! Transport adapter seam
//!
//! The session drives any byte transport through this trait: BLE GATT
//! write/notify in production, a scripted mock in tests. The adapter owns
//! framing — every [`LinkEvent::Inbound`] payload must be one whole packet,
//! never a partial or split delivery, so codec decoding stays unambiguous.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::TransportError;
use crate::types::PeerId;

// ----------------------------------------------------------------------------
// Link Events
// ----------------------------------------------------------------------------

/// Raw events flowing up from the transport adapter.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// One whole inbound packet payload.
    Inbound(Vec<u8>),
    /// The channel to the peer is gone.
    ConnectionLost { reason: String },
}

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Byte channel to a single remote peer.
#[async_trait]
pub trait Transport: Send {
    /// Establish the channel to `peer`.
    async fn connect(&mut self, peer: &PeerId) -> Result<(), TransportError>;

    /// Deliver one whole packet payload to the peer.
    async fn send(&mut self, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Take the single-consumer stream of link events.
    ///
    /// Yields `None` if the stream was already taken.
    fn take_link_events(&mut self) -> Option<mpsc::UnboundedReceiver<LinkEvent>>;

    /// Release the channel. Must be idempotent, and must be safe to call
    /// while a send is in flight (the pending send fails, it does not hang).
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}
