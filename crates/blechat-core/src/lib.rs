//! blechat core engine
//!
//! This crate provides the chat session state machine, the wire packet codec,
//! and the durable message store for a single-peer BLE chat, decoupled from
//! any specific transport or UI. Transports plug in through the
//! [`Transport`] trait; UIs consume typed [`SessionEvent`]s.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod packet;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::SessionConfig;
pub use errors::{ChatError, PacketError, Result, StorageError, TransportError};
pub use packet::Packet;
pub use session::{ChatSession, SessionEvent, SessionState};
pub use store::{MessageRecord, MessageStore};
pub use transport::{LinkEvent, Transport};
pub use types::{PeerId, Timestamp};
