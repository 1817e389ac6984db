use chrono::{NaiveDate, NaiveTime};
use cloudhawk_frame::payload::{
    parse_battery, parse_date, parse_fault_records, parse_schedule, parse_signal, parse_status,
    parse_text, parse_time, parse_trimming,
};
use cloudhawk_frame::{FaultRecord, MowerState, ResponseKey, SignalSelector};
use serde::Serialize;

use crate::store::ResponseStore;

/// Point-in-time view of everything known about the mower.
///
/// Fields whose response has not arrived keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub serial_number: String,
    pub firmware_version: String,
    pub battery_level: u8,
    pub is_charging: bool,
    pub signal: SignalSelector,
    pub trimming_enabled: bool,
    pub has_schedule: bool,
    pub state: MowerState,
    pub fault_records: Vec<FaultRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_time: Option<NaiveTime>,
}

impl DeviceInfo {
    /// Decode the latest stored responses into a snapshot.
    pub fn from_store(store: &ResponseStore) -> Self {
        let mut info = Self::default();
        let latest = |key: ResponseKey| store.get(key);

        if let Some(entry) = latest(ResponseKey::SERIAL) {
            info.serial_number = parse_text(&entry.body);
        }
        if let Some(entry) = latest(ResponseKey::FIRMWARE) {
            info.firmware_version = parse_text(&entry.body);
        }
        if let Some(entry) = latest(ResponseKey::BATTERY) {
            let battery = parse_battery(&entry.body);
            info.battery_level = battery.level;
            info.is_charging = battery.charging;
        }
        if let Some(entry) = latest(ResponseKey::SIGNAL) {
            info.signal = parse_signal(&entry.body);
        }
        if let Some(entry) = latest(ResponseKey::TRIMMING) {
            info.trimming_enabled = parse_trimming(&entry.body);
        }
        if let Some(entry) = latest(ResponseKey::SCHEDULE) {
            info.has_schedule = parse_schedule(&entry.body);
        }
        if let Some(entry) = latest(ResponseKey::STATUS) {
            info.state = parse_status(&entry.body);
        }
        if let Some(entry) = latest(ResponseKey::FAULT_RECORDS) {
            info.fault_records = parse_fault_records(&entry.body);
        }
        if let Some(entry) = latest(ResponseKey::SYSTEM_DATE) {
            info.current_date = parse_date(&entry.body);
        }
        if let Some(entry) = latest(ResponseKey::SYSTEM_TIME) {
            info.current_time = parse_time(&entry.body);
        }

        info
    }

    /// Serial number, or `Unknown` before it has been read.
    pub fn display_serial(&self) -> &str {
        if self.serial_number.is_empty() {
            "Unknown"
        } else {
            &self.serial_number
        }
    }
}
