//! Core types for the chat engine
//!
//! Newtype wrappers for the values that cross module boundaries: the peer
//! address used to key stored chat logs, and the sortable message timestamp.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Peer Identifier
// ----------------------------------------------------------------------------

/// Opaque identifier for a remote device: the transport address reported by
/// the platform (for BLE, a device address such as `AA:BB:CC:DD:EE:FF`).
///
/// The address is normalized on construction (trimmed, uppercased) so the
/// same device maps to the same stored chat log regardless of how the OS
/// reports the address casing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Normalize and wrap a device address. Empty addresses are rejected.
    pub fn new(address: impl AsRef<str>) -> Result<Self, crate::ChatError> {
        let normalized = address.as_ref().trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(crate::ChatError::invalid_peer("empty peer address"));
        }
        Ok(Self(normalized))
    }

    /// The normalized address string, as used for storage keys.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PeerId {
    type Err = crate::ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp since the Unix epoch.
///
/// Stored sortable; the 12-hour clock string shown next to messages is a
/// display concern, produced by [`Timestamp::to_clock`] at render time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from raw milliseconds.
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Get the current timestamp.
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as u64)
    }

    /// Get the raw milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Format as a local-time 12-hour clock string, e.g. `"03:45 PM"`.
    pub fn to_clock(&self) -> String {
        use chrono::{Local, TimeZone};
        Local
            .timestamp_millis_opt(self.0 as i64)
            .single()
            .map(|dt| dt.format("%I:%M %p").to_string())
            .unwrap_or_else(|| "??:??".to_string())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
