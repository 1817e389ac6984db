//! Command tags understood by CloudHawk firmware.
//!
//! Each command has one fixed tag and one stable snake_case name. The name
//! table is the single source for logging and for looking commands up from
//! text; nothing derives names at runtime.

use std::fmt;
use std::str::FromStr;

use crate::codec::ResponseKey;

/// A protocol command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    // Control
    Start,
    StartOnce,
    Stop,
    Charge,
    Reset,
    SpiralCut,
    EdgeCutOnce,

    // Info
    GetFirmware,
    GetSerial,
    GetDeviceStatus,
    GetStatus,
    GetSignal,
    GetBattery,

    // Settings
    GetCutWidth,
    GetTrimming,
    GetRainSettings,
    GetRainDelay,
    GetUltrasonicDistance,
    GetUltrasonicStatus,

    // Schedule
    GetCutDay,
    GetCutSchedule,
    SetCutSchedule,

    // System
    GetSystemDate,
    GetSystemTime,
    SetSystemDate,
    SetSystemTime,
    GetLanguage,

    // Security
    GetPin,
    GetPuk,

    // Records
    GetWorkingTime,
    GetHealthRecord,
    GetFaultRecord,
    GetCuttingRecord,
    GetChargingRecord,
}

impl CommandCode {
    /// Every command, in table order.
    pub const ALL: [CommandCode; 34] = [
        Self::Start,
        Self::StartOnce,
        Self::Stop,
        Self::Charge,
        Self::Reset,
        Self::SpiralCut,
        Self::EdgeCutOnce,
        Self::GetFirmware,
        Self::GetSerial,
        Self::GetDeviceStatus,
        Self::GetStatus,
        Self::GetSignal,
        Self::GetBattery,
        Self::GetCutWidth,
        Self::GetTrimming,
        Self::GetRainSettings,
        Self::GetRainDelay,
        Self::GetUltrasonicDistance,
        Self::GetUltrasonicStatus,
        Self::GetCutDay,
        Self::GetCutSchedule,
        Self::SetCutSchedule,
        Self::GetSystemDate,
        Self::GetSystemTime,
        Self::SetSystemDate,
        Self::SetSystemTime,
        Self::GetLanguage,
        Self::GetPin,
        Self::GetPuk,
        Self::GetWorkingTime,
        Self::GetHealthRecord,
        Self::GetFaultRecord,
        Self::GetCuttingRecord,
        Self::GetChargingRecord,
    ];

    /// Tag bytes as sent on the wire, before the BLE sub-prefix.
    pub fn tag(self) -> &'static [u8] {
        match self {
            Self::Start => &[0x05],
            Self::StartOnce => &[0x7d],
            Self::Stop => &[0x29],
            Self::Charge => &[0x06],
            Self::Reset => &[0x0f],
            Self::SpiralCut => &[0x79],
            Self::EdgeCutOnce => &[0x7c],
            Self::GetFirmware => &[0x01],
            Self::GetSerial => &[0x02],
            Self::GetDeviceStatus => &[0x02, 0x01],
            Self::GetStatus => &[0x81],
            Self::GetSignal => &[0x0b],
            Self::GetBattery => &[0x83],
            Self::GetCutWidth => &[0x09],
            Self::GetTrimming => &[0x07],
            Self::GetRainSettings => &[0x20],
            Self::GetRainDelay => &[0x32],
            Self::GetUltrasonicDistance => &[0x56],
            Self::GetUltrasonicStatus => &[0x54],
            Self::GetCutDay => &[0x11],
            Self::GetCutSchedule => &[0x70],
            Self::SetCutSchedule => &[0x71],
            Self::GetSystemDate => &[0x19],
            Self::GetSystemTime => &[0x1b],
            Self::SetSystemDate => &[0x1a],
            Self::SetSystemTime => &[0x1c],
            Self::GetLanguage => &[0x1d],
            Self::GetPin => &[0x03],
            Self::GetPuk => &[0x31],
            Self::GetWorkingTime => &[0x7a],
            Self::GetHealthRecord => &[0x18],
            Self::GetFaultRecord => &[0x15],
            Self::GetCuttingRecord => &[0x16],
            Self::GetChargingRecord => &[0x17],
        }
    }

    /// Stable snake_case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::StartOnce => "start_once",
            Self::Stop => "stop",
            Self::Charge => "charge",
            Self::Reset => "reset",
            Self::SpiralCut => "spiral_cut",
            Self::EdgeCutOnce => "edge_cut_once",
            Self::GetFirmware => "get_firmware",
            Self::GetSerial => "get_serial",
            Self::GetDeviceStatus => "get_device_status",
            Self::GetStatus => "get_status",
            Self::GetSignal => "get_signal",
            Self::GetBattery => "get_battery",
            Self::GetCutWidth => "get_cut_width",
            Self::GetTrimming => "get_trimming",
            Self::GetRainSettings => "get_rain_settings",
            Self::GetRainDelay => "get_rain_delay",
            Self::GetUltrasonicDistance => "get_ultrasonic_distance",
            Self::GetUltrasonicStatus => "get_ultrasonic_status",
            Self::GetCutDay => "get_cut_day",
            Self::GetCutSchedule => "get_cut_schedule",
            Self::SetCutSchedule => "set_cut_schedule",
            Self::GetSystemDate => "get_system_date",
            Self::GetSystemTime => "get_system_time",
            Self::SetSystemDate => "set_system_date",
            Self::SetSystemTime => "set_system_time",
            Self::GetLanguage => "get_language",
            Self::GetPin => "get_pin",
            Self::GetPuk => "get_puk",
            Self::GetWorkingTime => "get_working_time",
            Self::GetHealthRecord => "get_health_record",
            Self::GetFaultRecord => "get_fault_record",
            Self::GetCuttingRecord => "get_cutting_record",
            Self::GetChargingRecord => "get_charging_record",
        }
    }

    /// Look a command up by its snake_case name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Look a single-byte command up by tag.
    ///
    /// Responses echo the request tag in their status byte, so this also
    /// names inbound response families.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == [tag])
    }

    /// Key under which the response to this command is stored.
    ///
    /// `None` for wide tags, whose responses are not keyed by the request.
    pub fn response_key(self) -> Option<ResponseKey> {
        match self.tag() {
            [tag] => Some(ResponseKey::for_tag(*tag)),
            _ => None,
        }
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandCode {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

/// A command name outside the table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command '{0}'")]
pub struct UnknownCommand(pub String);

/// Human-readable name for a response family, for logs.
pub fn response_name(key: ResponseKey) -> &'static str {
    CommandCode::from_tag(key.status)
        .map(CommandCode::name)
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn names_are_unique_and_round_trip() {
        let mut seen = HashSet::new();
        for command in CommandCode::ALL {
            assert!(seen.insert(command.name()), "duplicate {command}");
            assert_eq!(CommandCode::from_name(command.name()), Some(command));
            assert_eq!(command.name().parse::<CommandCode>(), Ok(command));
        }
    }

    #[test]
    fn single_byte_tags_are_unique() {
        let mut seen = HashSet::new();
        for command in CommandCode::ALL {
            if let [tag] = command.tag() {
                assert!(seen.insert(*tag), "duplicate tag {tag:02x}");
            }
        }
    }

    #[test]
    fn from_tag_names_responses() {
        assert_eq!(CommandCode::from_tag(0x83), Some(CommandCode::GetBattery));
        assert_eq!(CommandCode::from_tag(0x0b), Some(CommandCode::GetSignal));
        assert_eq!(CommandCode::from_tag(0xee), None);
    }

    #[test]
    fn wide_tag_has_no_response_key() {
        assert_eq!(CommandCode::GetDeviceStatus.response_key(), None);
        assert_eq!(
            CommandCode::GetBattery.response_key(),
            Some(ResponseKey::BATTERY)
        );
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = "launch".parse::<CommandCode>().unwrap_err();
        assert_eq!(err.to_string(), "unknown command 'launch'");
    }

    #[test]
    fn response_name_lookup() {
        assert_eq!(
            response_name(ResponseKey::FAULT_RECORDS),
            "get_fault_record"
        );
        assert_eq!(response_name(ResponseKey::new(0x80, 0xee)), "unknown");
    }
}
