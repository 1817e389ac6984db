use std::time::Duration;

/// Controls connection lifecycle timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MowerConfig {
    /// Substring matched against advertised names when no address is known.
    pub device_name: String,
    /// How long a discovery scan runs.
    pub scan_time: Duration,
    /// Upper bound on a single transport connect.
    pub connect_timeout: Duration,
    /// Pause between bootstrap requests.
    pub bootstrap_delay: Duration,
    /// How often the maintenance loop checks the link.
    pub maintenance_interval: Duration,
    /// Wait after a failed reconnect before the next check.
    pub retry_backoff: Duration,
    /// Retry interval of the startup connect loop.
    pub initial_retry_interval: Duration,
    /// How long setup validation waits for the serial number to arrive.
    pub validation_settle: Duration,
}

impl Default for MowerConfig {
    fn default() -> Self {
        Self {
            device_name: "SN".to_string(),
            scan_time: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            bootstrap_delay: Duration::from_secs(1),
            maintenance_interval: Duration::from_secs(5),
            retry_backoff: Duration::from_secs(10),
            initial_retry_interval: Duration::from_secs(5),
            validation_settle: Duration::from_secs(3),
        }
    }
}
