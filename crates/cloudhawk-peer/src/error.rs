/// Errors that can occur in mower connection operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] cloudhawk_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] cloudhawk_frame::FrameError),

    /// No live link to the mower.
    #[error("not connected to mower")]
    NotConnected,

    /// Scan finished without a peripheral whose name matches.
    #[error("no device matching '{0}' found")]
    DeviceNotFound(String),

    /// Connect attempt timed out.
    #[error("connect timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Command name outside the supported set.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// One-shot setup validation failed.
    #[error("cannot connect: {0}")]
    CannotConnect(String),

    /// The manager is shutting down.
    #[error("connection manager shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, PeerError>;
