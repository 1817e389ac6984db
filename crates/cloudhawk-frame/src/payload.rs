//! Decoders for response bodies.
//!
//! Every decoder takes the frame body (command and status tags at offsets 0
//! and 1) and is total: undersized or unexpected input yields the documented
//! default instead of an error.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

const DATA_OFFSET: usize = 2;
const FAULT_RECORD_SIZE: usize = 7;
const CHARGING_FLAG: u8 = 0x04;

/// Battery reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatteryStatus {
    /// Charge level, percent.
    pub level: u8,
    pub charging: bool,
}

/// Boundary-wire signal selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum SignalSelector {
    #[default]
    S1,
    S2,
    S3,
}

impl SignalSelector {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::S1),
            2 => Some(Self::S2),
            3 => Some(Self::S3),
            _ => None,
        }
    }
}

impl fmt::Display for SignalSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::S1 => "S1",
            Self::S2 => "S2",
            Self::S3 => "S3",
        };
        f.write_str(name)
    }
}

/// Operational state reported in status pushes.
///
/// `Idle` and `Error` have no wire code yet; they exist for hosts that map
/// their own states onto this type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MowerState {
    #[default]
    Unknown,
    Idle,
    Mowing,
    Docked,
    Returning,
    Stopped,
    Error,
}

impl MowerState {
    /// Map a status byte through the known state table.
    pub fn from_byte(value: u8) -> Self {
        match value {
            0x01 => Self::Returning,
            0x38 => Self::Mowing,
            0x0b => Self::Docked,
            0x0e => Self::Stopped,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Idle => "idle",
            Self::Mowing => "mowing",
            Self::Docked => "docked",
            Self::Returning => "returning",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for MowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the fault history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FaultRecord {
    pub timestamp: NaiveDateTime,
    pub error_code: u8,
}

fn data(body: &[u8]) -> &[u8] {
    body.get(DATA_OFFSET..).unwrap_or_default()
}

/// Level at offset 5, charging when offset 7 is `0x04`. Needs 8 bytes.
pub fn parse_battery(body: &[u8]) -> BatteryStatus {
    match body {
        [_, _, _, _, _, level, _, flags, ..] => BatteryStatus {
            level: *level,
            charging: *flags == CHARGING_FLAG,
        },
        _ => BatteryStatus::default(),
    }
}

/// Selector byte at offset 2; anything else is `S1`.
pub fn parse_signal(body: &[u8]) -> SignalSelector {
    body.get(DATA_OFFSET)
        .and_then(|&b| SignalSelector::from_byte(b))
        .unwrap_or_default()
}

/// Trimming is on when offset 2 is `0x01`.
pub fn parse_trimming(body: &[u8]) -> bool {
    body.get(DATA_OFFSET) == Some(&0x01)
}

/// A schedule exists when any byte after the tags is non-zero.
pub fn parse_schedule(body: &[u8]) -> bool {
    data(body).iter().any(|&b| b != 0)
}

/// State byte at offset 2 via [`MowerState::from_byte`].
pub fn parse_status(body: &[u8]) -> MowerState {
    body.get(DATA_OFFSET)
        .map(|&b| MowerState::from_byte(b))
        .unwrap_or_default()
}

/// Fixed 7-byte groups from offset 2: year (BE u16), month, day, hour,
/// minute, error code.
///
/// Stops at a trailing partial group or at the first group with an invalid
/// calendar value; records before it are kept.
pub fn parse_fault_records(body: &[u8]) -> Vec<FaultRecord> {
    let mut records = Vec::new();
    for group in data(body).chunks_exact(FAULT_RECORD_SIZE) {
        let year = u16::from_be_bytes([group[0], group[1]]);
        if year == 0 {
            break;
        }
        let timestamp = NaiveDate::from_ymd_opt(year.into(), group[2].into(), group[3].into())
            .and_then(|date| date.and_hms_opt(group[4].into(), group[5].into(), 0));
        let Some(timestamp) = timestamp else {
            break;
        };
        records.push(FaultRecord {
            timestamp,
            error_code: group[6],
        });
    }
    records
}

/// Year (BE u16) at 2..4, month at 4, day at 5. Year 0 means unset.
pub fn parse_date(body: &[u8]) -> Option<NaiveDate> {
    match body {
        [_, _, year_hi, year_lo, month, day, ..] => {
            let year = u16::from_be_bytes([*year_hi, *year_lo]);
            if year == 0 {
                return None;
            }
            NaiveDate::from_ymd_opt(year.into(), (*month).into(), (*day).into())
        }
        _ => None,
    }
}

/// Hour at 2, minute at 3.
pub fn parse_time(body: &[u8]) -> Option<NaiveTime> {
    match body {
        [_, _, hour, minute, ..] => NaiveTime::from_hms_opt((*hour).into(), (*minute).into(), 0),
        _ => None,
    }
}

/// ASCII text after the tags (serial number, firmware string).
pub fn parse_text(body: &[u8]) -> String {
    let text: String = data(body)
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect();
    text.trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string()
}
