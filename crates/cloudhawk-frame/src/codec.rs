use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::command::CommandCode;
use crate::error::{FrameError, Result};

/// Frame marker: 0x55 0xAA.
pub const HEADER: [u8; 2] = [0x55, 0xAA];

/// Sub-prefix that widens single-byte outbound command tags.
pub const BLE_PREFIX: u8 = 0x80;

/// Header (2) + length (1).
pub const MIN_FRAME_SIZE: usize = 3;

/// Largest body the 1-byte length field can describe.
pub const MAX_BODY: usize = u8::MAX as usize;

/// Identifies a response family: the (command tag, status tag) pair that
/// opens a notification body.
///
/// Every response of the same family maps onto the same key; the key says
/// nothing about which request produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResponseKey {
    pub command: u8,
    pub status: u8,
}

impl ResponseKey {
    pub const FIRMWARE: Self = Self::for_tag(0x01);
    pub const SERIAL: Self = Self::for_tag(0x02);
    pub const TRIMMING: Self = Self::for_tag(0x07);
    pub const SIGNAL: Self = Self::for_tag(0x0b);
    pub const FAULT_RECORDS: Self = Self::for_tag(0x15);
    pub const SYSTEM_DATE: Self = Self::for_tag(0x19);
    pub const SYSTEM_TIME: Self = Self::for_tag(0x1b);
    pub const SCHEDULE: Self = Self::for_tag(0x70);
    pub const STATUS: Self = Self::for_tag(0x81);
    pub const BATTERY: Self = Self::for_tag(0x83);

    pub const fn new(command: u8, status: u8) -> Self {
        Self { command, status }
    }

    /// Key of the response to a single-byte command tag.
    pub const fn for_tag(tag: u8) -> Self {
        Self::new(BLE_PREFIX, tag)
    }

    /// Combined 2-byte form.
    pub fn to_bytes(self) -> [u8; 2] {
        [self.command, self.status]
    }
}

impl fmt::Display for ResponseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}", self.command, self.status)
    }
}

/// A decoded inbound frame.
///
/// `body` is the window declared by the length byte. When it holds at least
/// two bytes, the first two are the command and status tags and the rest is
/// the response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Declared body length.
    pub length: u8,
    /// Body window (tags + data).
    pub body: Bytes,
    /// Trailing checksum byte, when the buffer carries one.
    pub checksum: Option<u8>,
    /// The complete notification as received.
    pub raw: Bytes,
}

impl Frame {
    /// Command tag, present when the body has both tags.
    pub fn command(&self) -> Option<u8> {
        self.key().map(|key| key.command)
    }

    /// Status tag, present when the body has both tags.
    pub fn status(&self) -> Option<u8> {
        self.key().map(|key| key.status)
    }

    /// Response family of this frame.
    pub fn key(&self) -> Option<ResponseKey> {
        match self.body.as_ref() {
            [command, status, ..] => Some(ResponseKey::new(*command, *status)),
            _ => None,
        }
    }

    /// Body bytes after the two tags.
    pub fn data(&self) -> &[u8] {
        self.body.get(2..).unwrap_or_default()
    }

    /// `Some(true)` when the trailing checksum matches, `None` when absent.
    ///
    /// Also `None` when `raw` is too short to cover the header and body.
    pub fn checksum_valid(&self) -> Option<bool> {
        let actual = self.checksum?;
        let covered = self.raw.get(..MIN_FRAME_SIZE + self.body.len())?;
        Some(checksum(covered) == actual)
    }

    /// Total wire size of header, length, body and checksum.
    pub fn wire_size(&self) -> usize {
        MIN_FRAME_SIZE + self.body.len() + 1
    }
}

/// Sum of all bytes modulo 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Encode an outbound frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬────────┬───────────────┬──────────┬──────────┐
/// │ Header    │ Length │ Tag (2B)      │ Payload  │ Checksum │
/// │ 0x55 0xAA │ (1B)   │ 0x80 <tag> or │          │ (1B)     │
/// │           │        │ <tag hi> <lo> │          │          │
/// └───────────┴────────┴───────────────┴──────────┴──────────┘
/// ```
///
/// Single-byte tags are prefixed with [`BLE_PREFIX`]. Length counts tag and
/// payload bytes; checksum is the byte sum of everything before it.
pub fn encode_frame(tag: &[u8], payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if tag.is_empty() || tag.len() > 2 {
        return Err(FrameError::InvalidTag { len: tag.len() });
    }

    let body_len = 2 + payload.len();
    if body_len > MAX_BODY {
        return Err(FrameError::PayloadTooLarge {
            size: body_len,
            max: MAX_BODY,
        });
    }

    let start = dst.len();
    dst.reserve(MIN_FRAME_SIZE + body_len + 1);
    dst.put_slice(&HEADER);
    dst.put_u8(body_len as u8);
    if tag.len() == 1 {
        dst.put_u8(BLE_PREFIX);
    }
    dst.put_slice(tag);
    dst.put_slice(payload);
    let sum = checksum(&dst[start..]);
    dst.put_u8(sum);
    Ok(())
}

/// Encode a known command with an optional payload.
pub fn encode_command(command: CommandCode, payload: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    encode_frame(command.tag(), payload, &mut buf)?;
    Ok(buf.freeze())
}

/// Decode one notification into a frame.
///
/// Rejects buffers shorter than [`MIN_FRAME_SIZE`], without the `55 AA`
/// marker, or whose length byte runs past the end of the buffer. The checksum
/// is not enforced; see [`Frame::checksum_valid`].
pub fn decode_frame(raw: impl Into<Bytes>) -> Result<Frame> {
    let raw: Bytes = raw.into();
    if raw.len() < MIN_FRAME_SIZE {
        return Err(FrameError::Truncated {
            len: raw.len(),
            min: MIN_FRAME_SIZE,
        });
    }

    if raw[0..2] != HEADER {
        return Err(FrameError::InvalidHeader);
    }

    let length = raw[2];
    let end = MIN_FRAME_SIZE + length as usize;
    if end > raw.len() {
        return Err(FrameError::LengthOverflow {
            declared: length as usize,
            available: raw.len() - MIN_FRAME_SIZE,
        });
    }

    Ok(Frame {
        length,
        body: raw.slice(MIN_FRAME_SIZE..end),
        checksum: raw.get(end).copied(),
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unhex(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    #[test]
    fn encode_battery_request() {
        let frame = encode_command(CommandCode::GetBattery, &[]).unwrap();
        assert_eq!(frame.as_ref(), unhex("55aa02808304").as_slice());
    }

    #[test]
    fn encode_wide_tag_passes_through() {
        let frame = encode_command(CommandCode::GetDeviceStatus, &[]).unwrap();
        assert_eq!(&frame[..5], unhex("55aa020201").as_slice());
        assert_eq!(frame.len(), 6);
    }

    #[test]
    fn encode_with_payload_counts_payload_in_length() {
        let mut buf = BytesMut::new();
        encode_frame(&[0x71], &[0x01, 0x02, 0x03], &mut buf).unwrap();
        assert_eq!(buf[2], 5);
        assert_eq!(&buf[3..8], &[0x80, 0x71, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn checksum_is_sum_of_preceding_bytes() {
        for command in CommandCode::ALL {
            for payload in [&[][..], &[0xff; 4][..], &[0x10, 0x20, 0x30][..]] {
                let frame = encode_command(command, payload).unwrap();
                let (last, rest) = frame.split_last().unwrap();
                let sum: u32 = rest.iter().map(|&b| b as u32).sum();
                assert_eq!(*last as u32, sum % 256, "{command:?}");
            }
        }
    }

    #[test]
    fn decode_recovers_tag_and_payload() {
        let payload = [0x07, 0xe9, 0x09, 0x15];
        let mut buf = BytesMut::new();
        encode_frame(&[0x19], &payload, &mut buf).unwrap();

        let frame = decode_frame(buf.freeze()).unwrap();
        assert_eq!(frame.key(), Some(ResponseKey::SYSTEM_DATE));
        assert_eq!(frame.data(), &payload);
        assert_eq!(frame.checksum_valid(), Some(true));
    }

    #[test]
    fn decode_recovers_wide_tag() {
        let mut buf = BytesMut::new();
        encode_frame(&[0x02, 0x01], b"ok", &mut buf).unwrap();

        let frame = decode_frame(buf.freeze()).unwrap();
        assert_eq!(frame.command(), Some(0x02));
        assert_eq!(frame.status(), Some(0x01));
        assert_eq!(frame.data(), b"ok");
    }

    #[test]
    fn decode_rejects_short_buffer() {
        for raw in [&[][..], &[0x55][..], &[0x55, 0xaa][..]] {
            let err = decode_frame(raw.to_vec()).unwrap_err();
            assert!(matches!(err, FrameError::Truncated { .. }));
        }
    }

    #[test]
    fn decode_rejects_bad_header() {
        let err = decode_frame(unhex("aa5502808304")).unwrap_err();
        assert_eq!(err, FrameError::InvalidHeader);
    }

    #[test]
    fn decode_rejects_length_past_buffer() {
        let err = decode_frame(unhex("55aa0a8083")).unwrap_err();
        assert_eq!(
            err,
            FrameError::LengthOverflow {
                declared: 10,
                available: 2
            }
        );
    }

    #[test]
    fn decode_tolerates_bad_checksum() {
        let frame = decode_frame(unhex("55aa03800b02ff")).unwrap();
        assert_eq!(frame.key(), Some(ResponseKey::SIGNAL));
        assert_eq!(frame.checksum_valid(), Some(false));
    }

    #[test]
    fn decode_without_checksum_byte() {
        let frame = decode_frame(unhex("55aa03800b02")).unwrap();
        assert_eq!(frame.checksum, None);
        assert_eq!(frame.checksum_valid(), None);
        assert_eq!(frame.data(), &[0x02]);
    }

    #[test]
    fn decode_single_byte_body_has_no_key() {
        let frame = decode_frame(unhex("55aa0180")).unwrap();
        assert_eq!(frame.key(), None);
        assert!(frame.data().is_empty());
    }

    #[test]
    fn encode_rejects_bad_tags() {
        let mut buf = BytesMut::new();
        assert_eq!(
            encode_frame(&[], &[], &mut buf),
            Err(FrameError::InvalidTag { len: 0 })
        );
        assert_eq!(
            encode_frame(&[1, 2, 3], &[], &mut buf),
            Err(FrameError::InvalidTag { len: 3 })
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let mut buf = BytesMut::new();
        let result = encode_frame(&[0x71], &[0u8; 254], &mut buf);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn response_key_renders_as_hex_pair() {
        assert_eq!(ResponseKey::BATTERY.to_string(), "8083");
        assert_eq!(ResponseKey::SIGNAL.to_string(), "800b");
        assert_eq!(ResponseKey::STATUS.to_bytes(), [0x80, 0x81]);
    }

    #[test]
    fn checksum_valid_on_short_raw_is_none() {
        let frame = Frame {
            length: 3,
            body: Bytes::from_static(&[0x80, 0x0b, 0x02]),
            checksum: Some(0x8f),
            raw: Bytes::from_static(&[0x55, 0xaa]),
        };
        assert_eq!(frame.checksum_valid(), None);
    }

    #[test]
    fn frame_wire_size() {
        let frame = decode_frame(unhex("55aa02808304")).unwrap();
        assert_eq!(frame.wire_size(), 6);
    }
}
