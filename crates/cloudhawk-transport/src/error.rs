/// Errors that can occur in BLE transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No Bluetooth adapter is available on this host.
    #[error("no bluetooth adapter available")]
    NoAdapter,

    /// The requested peripheral was not seen during discovery.
    #[error("device {address} not found")]
    DeviceNotFound { address: String },

    /// Failed to establish the GATT connection.
    #[error("failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    /// The peripheral does not expose a known service/characteristic pair.
    #[error("device {address} does not expose the mower service characteristics")]
    MissingCharacteristics { address: String },

    /// The link is no longer connected.
    #[error("link not connected")]
    NotConnected,

    /// A characteristic write was rejected by the stack.
    #[error("write failed: {0}")]
    Write(String),

    /// Subscribing to notifications failed.
    #[error("notification subscribe failed: {0}")]
    Subscribe(String),

    /// Error reported by the platform BLE stack.
    #[cfg(feature = "btleplug")]
    #[error("ble stack error: {0}")]
    Ble(#[from] btleplug::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
