//! BLE transport implementation
//!
//! Central role over btleplug: scan for the peer's address with a service
//! filter, connect, subscribe to the chat characteristic, and forward
//! notifications and disconnect events up as link events.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use blechat_core::{LinkEvent, PeerId, Transport, TransportError};

use crate::config::BleConfig;

const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ----------------------------------------------------------------------------
// BLE Transport
// ----------------------------------------------------------------------------

/// Byte channel to one BLE peer over a single GATT characteristic.
pub struct BleTransport {
    config: BleConfig,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
    link_rx: Option<mpsc::UnboundedReceiver<LinkEvent>>,
    peripheral: Option<Peripheral>,
    characteristic: Option<Characteristic>,
    forwarder: Option<JoinHandle<()>>,
}

impl BleTransport {
    /// Create a transport with the given configuration.
    pub fn new(config: BleConfig) -> Self {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        Self {
            config,
            link_tx,
            link_rx: Some(link_rx),
            peripheral: None,
            characteristic: None,
            forwarder: None,
        }
    }

    /// Scan until the peripheral with the peer's address shows up.
    async fn find_peripheral(
        &self,
        adapter: &Adapter,
        peer: &PeerId,
    ) -> Result<Peripheral, TransportError> {
        let filter = ScanFilter {
            services: vec![self.config.service_uuid],
        };
        adapter
            .start_scan(filter)
            .await
            .map_err(|e| TransportError::Unavailable {
                reason: format!("failed to start BLE scan: {e}"),
            })?;

        let deadline = tokio::time::Instant::now() + self.config.scan_timeout;
        loop {
            let peripherals =
                adapter
                    .peripherals()
                    .await
                    .map_err(|e| TransportError::Unavailable {
                        reason: format!("failed to list peripherals: {e}"),
                    })?;

            for peripheral in peripherals {
                if address_matches(&peripheral.address().to_string(), peer) {
                    let _ = adapter.stop_scan().await;
                    return Ok(peripheral);
                }
            }

            if tokio::time::Instant::now() >= deadline {
                let _ = adapter.stop_scan().await;
                return Err(TransportError::ConnectionFailed {
                    peer: peer.to_string(),
                    reason: "peer not found during scan".to_string(),
                });
            }
            sleep(SCAN_POLL_INTERVAL).await;
        }
    }

    /// Spawn the task turning notifications and adapter disconnects into
    /// link events.
    async fn spawn_forwarder(
        &mut self,
        adapter: &Adapter,
        peripheral: &Peripheral,
        peer: &PeerId,
    ) -> Result<(), TransportError> {
        let mut notifications =
            peripheral
                .notifications()
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    peer: peer.to_string(),
                    reason: format!("failed to open notification stream: {e}"),
                })?;
        let mut central_events =
            adapter
                .events()
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    peer: peer.to_string(),
                    reason: format!("failed to open adapter event stream: {e}"),
                })?;

        let link_tx = self.link_tx.clone();
        let characteristic_uuid = self.config.characteristic_uuid;
        let peripheral_id = peripheral.id();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    notification = notifications.next() => match notification {
                        Some(data) if data.uuid == characteristic_uuid => {
                            if link_tx.send(LinkEvent::Inbound(data.value)).is_err() {
                                break;
                            }
                        }
                        Some(_) => {}
                        None => {
                            let _ = link_tx.send(LinkEvent::ConnectionLost {
                                reason: "notification stream ended".to_string(),
                            });
                            break;
                        }
                    },
                    event = central_events.next() => match event {
                        Some(CentralEvent::DeviceDisconnected(id)) if id == peripheral_id => {
                            let _ = link_tx.send(LinkEvent::ConnectionLost {
                                reason: "peer disconnected".to_string(),
                            });
                            break;
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
            debug!("link event forwarder ended");
        });

        self.forwarder = Some(handle);
        Ok(())
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn connect(&mut self, peer: &PeerId) -> Result<(), TransportError> {
        let manager = Manager::new()
            .await
            .map_err(|e| TransportError::Unavailable {
                reason: format!("failed to create BLE manager: {e}"),
            })?;
        let adapters = manager
            .adapters()
            .await
            .map_err(|e| TransportError::Unavailable {
                reason: format!("failed to get BLE adapters: {e}"),
            })?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Unavailable {
                reason: "no BLE adapters available".to_string(),
            })?;

        let peripheral = self.find_peripheral(&adapter, peer).await?;

        match timeout(self.config.connection_timeout, peripheral.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(TransportError::ConnectionFailed {
                    peer: peer.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(TransportError::Timeout {
                    duration_ms: self.config.connection_timeout.as_millis() as u64,
                })
            }
        }
        info!(peer = %peer, "connected");

        peripheral
            .discover_services()
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                peer: peer.to_string(),
                reason: format!("failed to discover services: {e}"),
            })?;

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == self.config.characteristic_uuid)
            .ok_or_else(|| TransportError::ConnectionFailed {
                peer: peer.to_string(),
                reason: "chat characteristic not found".to_string(),
            })?;

        peripheral
            .subscribe(&characteristic)
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                peer: peer.to_string(),
                reason: format!("failed to subscribe to notifications: {e}"),
            })?;

        self.spawn_forwarder(&adapter, &peripheral, peer).await?;
        self.peripheral = Some(peripheral);
        self.characteristic = Some(characteristic);
        Ok(())
    }

    async fn send(&mut self, payload: Vec<u8>) -> Result<(), TransportError> {
        let peripheral = self.peripheral.as_ref().ok_or(TransportError::NotConnected)?;
        let characteristic = self
            .characteristic
            .as_ref()
            .ok_or(TransportError::NotConnected)?;

        // Never split a frame: a partial delivery would be undecodable on
        // the other side.
        if payload.len() > self.config.max_frame_size {
            return Err(TransportError::SendFailed {
                reason: format!(
                    "frame of {} bytes exceeds the {}-byte limit",
                    payload.len(),
                    self.config.max_frame_size
                ),
            });
        }

        peripheral
            .write(characteristic, &payload, WriteType::WithoutResponse)
            .await
            .map_err(|e| TransportError::SendFailed {
                reason: e.to_string(),
            })?;
        debug!(bytes = payload.len(), "frame written");
        Ok(())
    }

    fn take_link_events(&mut self) -> Option<mpsc::UnboundedReceiver<LinkEvent>> {
        self.link_rx.take()
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.characteristic = None;
        if let Some(peripheral) = self.peripheral.take() {
            if let Err(e) = peripheral.disconnect().await {
                warn!(error = %e, "peripheral disconnect reported an error");
            }
        }
        Ok(())
    }
}

/// Compare an OS-reported peripheral address with the requested peer.
fn address_matches(candidate: &str, peer: &PeerId) -> bool {
    candidate.trim().eq_ignore_ascii_case(peer.as_str())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_matching_ignores_case() {
        let peer = PeerId::new("AA:BB:CC:DD:EE:FF").unwrap();
        assert!(address_matches("aa:bb:cc:dd:ee:ff", &peer));
        assert!(address_matches("AA:BB:CC:DD:EE:FF", &peer));
        assert!(!address_matches("11:22:33:44:55:66", &peer));
    }

    #[test]
    fn test_take_link_events_is_single_consumer() {
        let mut transport = BleTransport::new(BleConfig::default());
        assert!(transport.take_link_events().is_some());
        assert!(transport.take_link_events().is_none());
    }
}
