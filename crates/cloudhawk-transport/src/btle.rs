use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::profile::{select_profile, GattProfile};
use crate::traits::{DiscoveredDevice, Link, NotificationStream, Transport};

const DISCOVERY_POLL: Duration = Duration::from_millis(250);

/// Platform BLE transport backed by `btleplug`.
///
/// Uses the first adapter reported by the host stack. Connecting to an
/// address that has not been seen yet runs a scan until the peripheral shows
/// up or `discovery_timeout` elapses.
pub struct BtleTransport {
    adapter: Adapter,
    discovery_timeout: Duration,
}

impl BtleTransport {
    /// Default time spent looking for an unknown address before connecting.
    pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

    /// Open the first available adapter.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(TransportError::NoAdapter)?;
        match adapter.adapter_info().await {
            Ok(info) => debug!(adapter = %info, "using bluetooth adapter"),
            Err(err) => debug!(error = %err, "adapter info unavailable"),
        }
        Ok(Self {
            adapter,
            discovery_timeout: Self::DEFAULT_DISCOVERY_TIMEOUT,
        })
    }

    /// Override how long `connect` scans for an address it has not seen.
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    async fn find_peripheral(&self, address: &str) -> Result<Option<Peripheral>> {
        for peripheral in self.adapter.peripherals().await? {
            if peripheral
                .address()
                .to_string()
                .eq_ignore_ascii_case(address)
            {
                return Ok(Some(peripheral));
            }
        }
        Ok(None)
    }

    async fn discover_peripheral(&self, address: &str) -> Result<Peripheral> {
        if let Some(peripheral) = self.find_peripheral(address).await? {
            return Ok(peripheral);
        }

        debug!(address, "peripheral not cached; scanning");
        self.adapter.start_scan(ScanFilter::default()).await?;
        let deadline = tokio::time::Instant::now() + self.discovery_timeout;
        let found = loop {
            if let Some(peripheral) = self.find_peripheral(address).await? {
                break Some(peripheral);
            }
            if tokio::time::Instant::now() >= deadline {
                break None;
            }
            tokio::time::sleep(DISCOVERY_POLL).await;
        };
        if let Err(err) = self.adapter.stop_scan().await {
            debug!(error = %err, "stop_scan failed");
        }

        found.ok_or_else(|| TransportError::DeviceNotFound {
            address: address.to_string(),
        })
    }
}

#[async_trait]
impl Transport for BtleTransport {
    async fn scan(&self, scan_time: Duration) -> Result<Vec<DiscoveredDevice>> {
        self.adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(scan_time).await;
        let peripherals = self.adapter.peripherals().await;
        if let Err(err) = self.adapter.stop_scan().await {
            debug!(error = %err, "stop_scan failed");
        }

        let mut devices = Vec::new();
        for peripheral in peripherals? {
            let properties = peripheral.properties().await?;
            devices.push(DiscoveredDevice {
                address: peripheral.address().to_string(),
                name: properties.as_ref().and_then(|p| p.local_name.clone()),
                rssi: properties.as_ref().and_then(|p| p.rssi),
            });
        }
        debug!(count = devices.len(), "scan complete");
        Ok(devices)
    }

    async fn connect(&self, address: &str) -> Result<Arc<dyn Link>> {
        let peripheral = self.discover_peripheral(address).await?;

        peripheral
            .connect()
            .await
            .map_err(|err| TransportError::Connect {
                address: address.to_string(),
                reason: err.to_string(),
            })?;

        match BtleLink::open(peripheral.clone(), address).await {
            Ok(link) => {
                info!(
                    address,
                    profile = link.profile.name,
                    "gatt link established"
                );
                Ok(Arc::new(link))
            }
            Err(err) => {
                if let Err(disconnect_err) = peripheral.disconnect().await {
                    warn!(address, error = %disconnect_err, "disconnect after failed setup");
                }
                Err(err)
            }
        }
    }

    fn transport_name(&self) -> &'static str {
        "btleplug"
    }
}

/// GATT link over a `btleplug` peripheral.
pub struct BtleLink {
    peripheral: Peripheral,
    address: String,
    profile: GattProfile,
    write_char: Characteristic,
    notify_char: Characteristic,
}

impl BtleLink {
    async fn open(peripheral: Peripheral, address: &str) -> Result<Self> {
        peripheral.discover_services().await?;
        let characteristics = peripheral.characteristics();

        let profile = select_profile(characteristics.iter().map(|c| (c.service_uuid, c.uuid)))
            .ok_or_else(|| TransportError::MissingCharacteristics {
                address: address.to_string(),
            })?;

        let lookup = |uuid| {
            characteristics
                .iter()
                .find(|c| c.service_uuid == profile.service && c.uuid == uuid)
                .cloned()
                .ok_or_else(|| TransportError::MissingCharacteristics {
                    address: address.to_string(),
                })
        };
        let write_char = lookup(profile.write)?;
        let notify_char = lookup(profile.notify)?;

        Ok(Self {
            peripheral,
            address: address.to_string(),
            profile,
            write_char,
            notify_char,
        })
    }

    fn write_type(&self) -> WriteType {
        if self
            .write_char
            .properties
            .contains(CharPropFlags::WRITE_WITHOUT_RESPONSE)
        {
            WriteType::WithoutResponse
        } else {
            WriteType::WithResponse
        }
    }
}

#[async_trait]
impl Link for BtleLink {
    fn address(&self) -> &str {
        &self.address
    }

    async fn subscribe(&self) -> Result<NotificationStream> {
        let stream = self.peripheral.notifications().await?;
        self.peripheral
            .subscribe(&self.notify_char)
            .await
            .map_err(|err| TransportError::Subscribe(err.to_string()))?;

        let uuid = self.notify_char.uuid;
        let values = stream.filter_map(move |notification| {
            let value = (notification.uuid == uuid).then_some(notification.value);
            futures_util::future::ready(value)
        });
        Ok(Box::pin(values))
    }

    async fn unsubscribe(&self) -> Result<()> {
        self.peripheral.unsubscribe(&self.notify_char).await?;
        Ok(())
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        self.peripheral
            .write(&self.write_char, data, self.write_type())
            .await
            .map_err(|err| TransportError::Write(err.to_string()))
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        debug!(address = %self.address, "gatt link closed");
        Ok(())
    }
}
