/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The buffer does not start with the `55 AA` marker.
    #[error("invalid frame header (expected 0x55 0xAA)")]
    InvalidHeader,

    /// The buffer is shorter than header + length byte.
    #[error("frame truncated ({len} bytes, need at least {min})")]
    Truncated { len: usize, min: usize },

    /// The length byte declares more body bytes than the buffer holds.
    #[error("declared length {declared} exceeds available {available} bytes")]
    LengthOverflow { declared: usize, available: usize },

    /// Command tags are one or two bytes wide.
    #[error("invalid command tag width ({len} bytes)")]
    InvalidTag { len: usize },

    /// Tag plus payload does not fit the 1-byte length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
