//! 55AA framing, command table and payload decoders for CloudHawk mowers.
//!
//! Every frame on the wire is:
//! - the 2-byte marker `55 AA`
//! - a 1-byte length covering tags and payload
//! - a 2-byte tag (single-byte commands are widened with `0x80`)
//! - the payload
//! - a 1-byte additive checksum
//!
//! Pure functions only; no I/O and no state.

pub mod codec;
pub mod command;
pub mod error;
pub mod payload;

pub use codec::{
    checksum, decode_frame, encode_command, encode_frame, Frame, ResponseKey, BLE_PREFIX, HEADER,
    MAX_BODY, MIN_FRAME_SIZE,
};
pub use command::{response_name, CommandCode, UnknownCommand};
pub use error::{FrameError, Result};
pub use payload::{BatteryStatus, FaultRecord, MowerState, SignalSelector};
