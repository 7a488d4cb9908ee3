//! BLE transport configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Service and Characteristic UUIDs
// ----------------------------------------------------------------------------

/// Chat service advertised by the peer device.
pub const CHAT_SERVICE_UUID: Uuid = Uuid::from_u128(0x12345678_1234_5678_1234_567812345678);

/// Characteristic carrying chat frames (write + notify).
pub const CHAT_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x87654321_4321_6789_4321_678943210987);

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the BLE chat transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BleConfig {
    /// Service used to filter the scan.
    pub service_uuid: Uuid,
    /// Characteristic frames are written to and notified on.
    pub characteristic_uuid: Uuid,
    /// How long to scan for the peer before giving up.
    pub scan_timeout: Duration,
    /// Upper bound on the GATT connect itself.
    pub connection_timeout: Duration,
    /// Largest frame written to the characteristic. Frames are never split;
    /// an oversized payload is rejected so packet framing stays whole.
    pub max_frame_size: usize,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            service_uuid: CHAT_SERVICE_UUID,
            characteristic_uuid: CHAT_CHARACTERISTIC_UUID,
            scan_timeout: Duration::from_secs(10),
            connection_timeout: Duration::from_secs(5),
            max_frame_size: 512,
        }
    }
}

impl BleConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan timeout.
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the maximum frame size.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
