//! Session configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Tunables the caller passes into a `ChatSession`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Upper bound on the transport connect, applied around whatever limits
    /// the adapter enforces itself. `None` leaves timing entirely to the
    /// adapter.
    pub connect_timeout: Option<Duration>,
    /// Display name used as the sender of inbound records — the wire carries
    /// no remote nickname. Defaults to the peer address.
    pub peer_label: Option<String>,
}

impl SessionConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the display label for the remote peer.
    pub fn with_peer_label(mut self, label: impl Into<String>) -> Self {
        self.peer_label = Some(label.into());
        self
    }
}
