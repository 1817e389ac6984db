use std::fmt;

use cloudhawk_frame::{FrameError, UnknownCommand};
use cloudhawk_peer::PeerError;
use cloudhawk_transport::TransportError;

// Process exit codes. 64 follows sysexits(3) EX_USAGE; 124 matches timeout(1).
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match err {
        TransportError::DeviceNotFound { .. } | TransportError::NotConnected => FAILURE,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::InvalidTag { .. } => CliError::new(INTERNAL, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Frame(err) => frame_error(context, err),
        PeerError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        PeerError::UnknownCommand(_) => CliError::new(USAGE, format!("{context}: {err}")),
        PeerError::NotConnected
        | PeerError::DeviceNotFound(_)
        | PeerError::CannotConnect(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        PeerError::Shutdown => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

pub fn unknown_command(err: UnknownCommand) -> CliError {
    CliError::usage(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn timeouts_map_to_124() {
        let err = peer_error("connect", PeerError::Timeout(Duration::from_secs(1)));
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.starts_with("connect: "));
    }

    #[test]
    fn nested_transport_errors_keep_their_code() {
        let err = peer_error(
            "connect",
            PeerError::Transport(TransportError::Connect {
                address: "AA".to_string(),
                reason: "refused".to_string(),
            }),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);

        let err = peer_error("scan", PeerError::Transport(TransportError::NoAdapter));
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn missing_devices_are_plain_failures() {
        let err = transport_error(
            "connect",
            TransportError::DeviceNotFound {
                address: "AA".to_string(),
            },
        );
        assert_eq!(err.code, FAILURE);
        assert_eq!(err.message, "connect: device AA not found");

        let err = transport_error("write", TransportError::Write("busy".to_string()));
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn malformed_frames_are_data_invalid() {
        let err = frame_error("decode", FrameError::InvalidHeader);
        assert_eq!(err.code, DATA_INVALID);
        let err = peer_error("send", PeerError::UnknownCommand("mow".to_string()));
        assert_eq!(err.code, USAGE);
    }
}
