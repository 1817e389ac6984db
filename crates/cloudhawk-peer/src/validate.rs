use std::sync::Arc;

use cloudhawk_transport::Transport;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{error, info};

use crate::config::MowerConfig;
use crate::error::{PeerError, Result};
use crate::info::DeviceInfo;
use crate::manager::ConnectionManager;

/// Outcome of a successful setup check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedDevice {
    pub address: String,
    /// Display title, `CloudHawk <serial>`.
    pub title: String,
    pub info: DeviceInfo,
}

/// Connect once, read the device identity and disconnect.
///
/// Waits up to [`MowerConfig::validation_settle`] for the serial number;
/// when it does not arrive the title falls back to `Unknown`. Every failure
/// is reported as [`PeerError::CannotConnect`].
pub async fn validate_device(
    transport: Arc<dyn Transport>,
    address: &str,
    config: &MowerConfig,
) -> Result<ValidatedDevice> {
    let manager = ConnectionManager::new(transport, config.clone());
    let outcome = read_serial(&manager, address).await;
    manager.disconnect().await;

    match outcome {
        Ok(info) => {
            let title = format!("CloudHawk {}", info.display_serial());
            info!(address, title = %title, "mower validated");
            Ok(ValidatedDevice {
                address: address.to_string(),
                title,
                info,
            })
        }
        Err(err) => {
            error!(address, error = %err, "mower validation failed");
            Err(PeerError::CannotConnect(err.to_string()))
        }
    }
}

async fn read_serial(manager: &ConnectionManager, address: &str) -> Result<DeviceInfo> {
    let mut updates = manager.subscribe();
    manager.connect(Some(address)).await?;

    let deadline = Instant::now() + manager.config().validation_settle;
    loop {
        let info = manager.snapshot();
        if !info.serial_number.is_empty() {
            return Ok(info);
        }
        match tokio::time::timeout_at(deadline, updates.changed()).await {
            Ok(true) => continue,
            _ => return Ok(info),
        }
    }
}
