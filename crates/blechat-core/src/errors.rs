//! Error types for the chat engine
//!
//! One leaf enum per concern (packet decoding, storage, transport), unified
//! under [`ChatError`]. Decode failures are recoverable by design; the
//! session drops the frame and stays alive.

use thiserror::Error;

use crate::session::SessionState;

// ----------------------------------------------------------------------------
// Packet Errors
// ----------------------------------------------------------------------------

/// Wire frame decode failures.
#[derive(Debug, Error)]
pub enum PacketError {
    #[error("packet payload is not valid UTF-8")]
    InvalidUtf8(#[from] core::str::Utf8Error),

    #[error("malformed packet: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown packet tag: {tag}")]
    UnknownTag { tag: String },

    #[error("packet tag `{tag}` carries {found} content, expected {expected}")]
    ContentType {
        tag: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

// ----------------------------------------------------------------------------
// Storage Errors
// ----------------------------------------------------------------------------

/// Message store failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize history document: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("history document at {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("refusing to persist a record with empty content")]
    EmptyContent,
}

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Transport adapter failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {peer}: {reason}")]
    ConnectionFailed { peer: String, reason: String },

    #[error("connect timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("send failed: {reason}")]
    SendFailed { reason: String },

    #[error("transport is not connected")]
    NotConnected,

    #[error("transport unavailable: {reason}")]
    Unavailable { reason: String },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Crate-wide error type for the chat engine.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("{operation} is not permitted while {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("invalid peer address: {reason}")]
    InvalidPeer { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl ChatError {
    /// Create an invalid-state error for a rejected operation.
    pub fn invalid_state(operation: &'static str, state: SessionState) -> Self {
        ChatError::InvalidState { operation, state }
    }

    /// Create an invalid-peer error with a reason.
    pub fn invalid_peer<R: Into<String>>(reason: R) -> Self {
        ChatError::InvalidPeer {
            reason: reason.into(),
        }
    }

    /// Create a transport connection-failed error.
    pub fn connection_failed<P: Into<String>, R: Into<String>>(peer: P, reason: R) -> Self {
        ChatError::Transport(TransportError::ConnectionFailed {
            peer: peer.into(),
            reason: reason.into(),
        })
    }

    /// Create a transport send-failed error.
    pub fn send_failed<R: Into<String>>(reason: R) -> Self {
        ChatError::Transport(TransportError::SendFailed {
            reason: reason.into(),
        })
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, ChatError>;
