use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use cloudhawk_frame::ResponseKey;
use cloudhawk_peer::{ConnectionManager, MowerConfig, BOOTSTRAP_SEQUENCE};
use cloudhawk_transport::{BtleTransport, Transport};
use tokio::time::Instant;
use tracing::debug;

use crate::exit::{peer_error, transport_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod codec;
pub mod doctor;
pub mod info;
pub mod request;
pub mod scan;
pub mod send;
pub mod validate;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan for nearby mowers.
    Scan(ScanArgs),
    /// Connect, collect device information and print a snapshot.
    Info(InfoArgs),
    /// Send a mowing command (start, start_once, spiral, edge, stop, dock).
    Send(SendArgs),
    /// Send any protocol command and print its response.
    Request(RequestArgs),
    /// Keep a connection open and print a snapshot on every update.
    Watch(WatchArgs),
    /// Check that a mower can be reached and identified.
    Validate(ValidateArgs),
    /// Encode a command frame without connecting.
    Encode(EncodeArgs),
    /// Decode a captured notification.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Scan(args) => scan::run(args, format).await,
        Command::Info(args) => info::run(args, format).await,
        Command::Send(args) => send::run(args, format).await,
        Command::Request(args) => request::run(args, format).await,
        Command::Watch(args) => watch::run(args, format).await,
        Command::Validate(args) => validate::run(args, format).await,
        Command::Encode(args) => codec::encode(args, format),
        Command::Decode(args) => codec::decode(args, format),
        Command::Version(args) => version::run(args),
        Command::Doctor(args) => doctor::run(args, format).await,
    }
}

/// How to find and reach the mower.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Mower address. Without it, the first device whose name matches --name is used.
    #[arg(long, short = 'a', env = "CLOUDHAWK_ADDRESS")]
    pub address: Option<String>,
    /// Name fragment matched during discovery.
    #[arg(long, env = "CLOUDHAWK_NAME", default_value = "SN")]
    pub name: String,
    /// Connect timeout (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
    /// Discovery duration when no address is given; also bounds locating an uncached address.
    #[arg(long, default_value = "10s")]
    pub scan_time: String,
}

impl ConnectArgs {
    pub fn config(&self) -> CliResult<MowerConfig> {
        Ok(MowerConfig {
            device_name: self.name.clone(),
            connect_timeout: parse_duration(&self.timeout)?,
            scan_time: parse_duration(&self.scan_time)?,
            ..MowerConfig::default()
        })
    }
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Name fragment to filter on.
    #[arg(long, env = "CLOUDHAWK_NAME", default_value = "SN")]
    pub name: String,
    /// List every device seen, not only name matches.
    #[arg(long)]
    pub all: bool,
    /// Discovery duration (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub duration: String,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// How long to collect responses before printing (e.g. 10s).
    #[arg(long, default_value = "10s")]
    pub wait: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Command name.
    pub command: String,
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Protocol command name (e.g. get_battery, get_system_date).
    pub command: String,
    /// Hex payload appended after the tag.
    #[arg(long)]
    pub payload: Option<String>,
    /// Maximum time to wait for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait: String,
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Exit after printing N snapshots.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Mower address.
    #[arg(env = "CLOUDHAWK_ADDRESS")]
    pub address: String,
    /// Connect timeout (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
    /// How long to wait for the serial number.
    #[arg(long, default_value = "3s")]
    pub settle: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Protocol command name (e.g. start, get_battery).
    pub command: String,
    /// Hex payload appended after the tag.
    #[arg(long)]
    pub payload: Option<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Notification bytes as hex (spaces and colons allowed).
    pub frame: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}

/// Parse `5s`, `500ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}

/// Parse hex, ignoring whitespace, colons and a leading `0x`.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let cleaned: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(&cleaned).map_err(|err| {
        CliError::new(
            crate::exit::DATA_INVALID,
            format!("invalid hex '{input}': {err}"),
        )
    })
}

/// Open the first adapter; unseen addresses are looked up for at most `discovery`.
pub async fn open_transport(discovery: Duration) -> CliResult<Arc<dyn Transport>> {
    let transport = BtleTransport::new()
        .await
        .map_err(|err| transport_error("bluetooth unavailable", err))?
        .with_discovery_timeout(discovery);
    Ok(Arc::new(transport))
}

/// Open the transport and connect once.
pub async fn connect(args: &ConnectArgs) -> CliResult<ConnectionManager> {
    let config = args.config()?;
    let transport = open_transport(config.scan_time).await?;
    let manager = ConnectionManager::new(transport, config);
    manager
        .connect(args.address.as_deref())
        .await
        .map_err(|err| peer_error("connect failed", err))?;
    Ok(manager)
}

/// Wait until every bootstrap response is stored or `limit` elapses.
pub async fn collect_responses(manager: &ConnectionManager, limit: Duration) {
    let expected: Vec<ResponseKey> = BOOTSTRAP_SEQUENCE
        .iter()
        .filter_map(|command| command.response_key())
        .collect();
    let mut updates = manager.subscribe();
    let deadline = Instant::now() + limit;

    loop {
        let missing = expected
            .iter()
            .filter(|key| !manager.store().contains(**key))
            .count();
        if missing == 0 {
            return;
        }
        match tokio::time::timeout_at(deadline, updates.changed()).await {
            Ok(true) => continue,
            _ => {
                debug!(missing, "stopped waiting for responses");
                return;
            }
        }
    }
}
