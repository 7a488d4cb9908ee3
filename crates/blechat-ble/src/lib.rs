//! Bluetooth Low Energy transport adapter for blechat
//!
//! Central-role implementation of the core [`Transport`] seam over btleplug:
//! frames are written to the peer's chat characteristic and arrive back as
//! notifications on the same characteristic.
//!
//! [`Transport`]: blechat_core::Transport

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod transport;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{BleConfig, CHAT_CHARACTERISTIC_UUID, CHAT_SERVICE_UUID};
pub use transport::BleTransport;
