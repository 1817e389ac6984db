use std::io::{IsTerminal, Write};

use chrono::{SecondsFormat, Utc};
use clap::ValueEnum;
use cloudhawk_frame::{response_name, Frame};
use cloudhawk_peer::DeviceInfo;
use cloudhawk_transport::DiscoveredDevice;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

#[derive(Serialize)]
struct SnapshotOutput<'a> {
    address: Option<&'a str>,
    timestamp: String,
    #[serde(flatten)]
    info: &'a DeviceInfo,
}

pub fn print_snapshot(info: &DeviceInfo, address: Option<&str>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&SnapshotOutput {
            address,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            info,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FIELD", "VALUE"]);
            for (field, value) in snapshot_rows(info) {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("CloudHawk {}", info.display_serial());
            for (field, value) in snapshot_rows(info) {
                println!("  {field:<16} {value}");
            }
        }
        OutputFormat::Raw => {
            println!(
                "{} {} {}",
                info.state,
                info.battery_level,
                if info.is_charging { "charging" } else { "-" }
            );
        }
    }
}

fn snapshot_rows(info: &DeviceInfo) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        ("serial", info.display_serial().to_string()),
        ("firmware", info.firmware_version.clone()),
        ("state", info.state.to_string()),
        ("battery", format!("{}%", info.battery_level)),
        ("charging", info.is_charging.to_string()),
        ("signal", info.signal.to_string()),
        ("trimming", info.trimming_enabled.to_string()),
        ("schedule", info.has_schedule.to_string()),
    ];
    if let Some(date) = info.current_date {
        rows.push(("date", date.to_string()));
    }
    if let Some(time) = info.current_time {
        rows.push(("time", time.format("%H:%M").to_string()));
    }
    let faults = if info.fault_records.is_empty() {
        "none".to_string()
    } else {
        info.fault_records
            .iter()
            .map(|record| {
                format!(
                    "{} code {}",
                    record.timestamp.format("%Y-%m-%d %H:%M"),
                    record.error_code
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    };
    rows.push(("faults", faults));
    rows
}

#[derive(Serialize)]
struct DeviceOutput<'a> {
    address: &'a str,
    name: Option<&'a str>,
    rssi: Option<i16>,
}

pub fn print_devices(devices: &[DiscoveredDevice], format: OutputFormat) {
    let rows: Vec<DeviceOutput<'_>> = devices
        .iter()
        .map(|device| DeviceOutput {
            address: &device.address,
            name: device.name.as_deref(),
            rssi: device.rssi,
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = new_table(vec!["ADDRESS", "NAME", "RSSI"]);
            for row in &rows {
                table.add_row(vec![
                    row.address.to_string(),
                    row.name.unwrap_or("-").to_string(),
                    row.rssi.map(|r| r.to_string()).unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &rows {
                println!(
                    "{}  {}  rssi={}",
                    row.address,
                    row.name.unwrap_or("-"),
                    row.rssi.map_or_else(|| "?".to_string(), |r| r.to_string())
                );
            }
        }
        OutputFormat::Raw => {
            for row in &rows {
                println!("{}", row.address);
            }
        }
    }
}

#[derive(Serialize)]
struct FrameOutput {
    length: u8,
    key: Option<String>,
    response: Option<&'static str>,
    data: String,
    checksum: Option<u8>,
    checksum_valid: Option<bool>,
    raw: String,
}

impl FrameOutput {
    fn new(frame: &Frame) -> Self {
        let key = frame.key();
        Self {
            length: frame.length,
            key: key.map(|key| key.to_string()),
            response: key.map(response_name),
            data: hex::encode(frame.data()),
            checksum: frame.checksum,
            checksum_valid: frame.checksum_valid(),
            raw: hex::encode(&frame.raw),
        }
    }
}

pub fn print_frame(frame: &Frame, format: OutputFormat) {
    let out = FrameOutput::new(frame);
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["KEY", "RESPONSE", "DATA", "CHECKSUM"]);
            table.add_row(vec![
                out.key.clone().unwrap_or_else(|| "-".to_string()),
                out.response.unwrap_or("-").to_string(),
                out.data.clone(),
                checksum_text(out.checksum_valid).to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "key={} ({}) len={} data={} checksum={}",
                out.key.as_deref().unwrap_or("-"),
                out.response.unwrap_or("-"),
                out.length,
                out.data,
                checksum_text(out.checksum_valid)
            );
        }
        OutputFormat::Raw => print_raw(frame.data()),
    }
}

fn checksum_text(valid: Option<bool>) -> &'static str {
    match valid {
        Some(true) => "ok",
        Some(false) => "mismatch",
        None => "absent",
    }
}

#[derive(Serialize)]
struct EncodedOutput<'a> {
    command: &'a str,
    frame: String,
}

pub fn print_encoded(command: &str, frame: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EncodedOutput {
            command,
            frame: hex::encode(frame),
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("{command}: {}", hex::encode(frame));
        }
        OutputFormat::Raw => print_raw(frame),
    }
}
