use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::Result;

/// Inbound notification payloads, one item per GATT notification.
///
/// The stream ends when the link drops or notifications are unsubscribed.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// A peripheral seen during a discovery scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Platform address (MAC on Linux/Windows, UUID on macOS).
    pub address: String,
    /// Advertised local name, when present.
    pub name: Option<String>,
    /// Last observed signal strength.
    pub rssi: Option<i16>,
}

impl DiscoveredDevice {
    /// True when the advertised name contains `fragment`.
    pub fn name_contains(&self, fragment: &str) -> bool {
        self.name
            .as_deref()
            .is_some_and(|name| name.contains(fragment))
    }
}

/// Entry point to a BLE stack: discovers peripherals and opens links.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Scan for `scan_time` and return every peripheral that was seen.
    async fn scan(&self, scan_time: Duration) -> Result<Vec<DiscoveredDevice>>;

    /// Open a GATT link to `address`.
    ///
    /// Implementations locate the mower's write/notify characteristic pair
    /// before returning; a peripheral without them fails with
    /// [`TransportError::MissingCharacteristics`](crate::TransportError::MissingCharacteristics)
    /// and is left disconnected.
    async fn connect(&self, address: &str) -> Result<Arc<dyn Link>>;

    /// Backend name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

/// A connected GATT link to one mower.
#[async_trait]
pub trait Link: Send + Sync {
    /// Peer address this link was opened to.
    fn address(&self) -> &str;

    /// Enable notifications on the notify characteristic.
    async fn subscribe(&self) -> Result<NotificationStream>;

    /// Disable notifications on the notify characteristic.
    async fn unsubscribe(&self) -> Result<()>;

    /// Write one complete frame to the write characteristic.
    async fn write(&self, data: &[u8]) -> Result<()>;

    /// Whether the underlying connection is still up.
    async fn is_connected(&self) -> bool;

    /// Tear down the connection.
    async fn disconnect(&self) -> Result<()>;
}

impl fmt::Debug for dyn Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("address", &self.address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_match_is_substring() {
        let device = DiscoveredDevice {
            address: "AA:BB:CC:DD:EE:FF".to_string(),
            name: Some("SN0190104721".to_string()),
            rssi: Some(-60),
        };
        assert!(device.name_contains("SN0190"));
        assert!(!device.name_contains("XX"));
    }

    #[test]
    fn unnamed_device_never_matches() {
        let device = DiscoveredDevice {
            address: "AA:BB:CC:DD:EE:FF".to_string(),
            name: None,
            rssi: None,
        };
        assert!(!device.name_contains(""));
    }
}
