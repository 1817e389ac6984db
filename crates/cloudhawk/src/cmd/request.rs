use std::sync::Arc;

use chrono::Utc;
use cloudhawk_frame::{decode_frame, encode_command, CommandCode, ResponseKey};
use cloudhawk_peer::{ConnectionManager, ResponseEntry};
use tokio::time::Instant;

use crate::cmd::{connect, parse_duration, parse_hex, RequestArgs};
use crate::exit::{frame_error, peer_error, unknown_command, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_encoded, print_frame, OutputFormat};

pub async fn run(args: RequestArgs, format: OutputFormat) -> CliResult<i32> {
    let command: CommandCode = args.command.parse().map_err(unknown_command)?;
    let payload = match &args.payload {
        Some(hex) => parse_hex(hex)?,
        None => Vec::new(),
    };
    let wait = parse_duration(&args.wait)?;

    let manager = connect(&args.connect).await?;
    let sent_at = Utc::now();
    let result = manager.send_with_payload(command, &payload).await;
    let response = match (&result, command.response_key()) {
        (Ok(()), Some(key)) => wait_for_response(&manager, key, sent_at, wait).await,
        _ => None,
    };
    manager.disconnect().await;
    result.map_err(|err| peer_error("request failed", err))?;

    let Some(key) = command.response_key() else {
        // Wide tags have no keyed response; report what was sent.
        let frame =
            encode_command(command, &payload).map_err(|err| frame_error("encode failed", err))?;
        print_encoded(command.name(), &frame, format);
        return Ok(SUCCESS);
    };

    let entry = response.ok_or_else(|| {
        CliError::new(TIMEOUT, format!("no {key} response within {wait:?}"))
    })?;
    let frame = decode_frame(entry.raw.clone()).map_err(|err| frame_error("decode failed", err))?;
    print_frame(&frame, format);
    Ok(SUCCESS)
}

/// Wait for an entry under `key` stored after `sent_at`.
async fn wait_for_response(
    manager: &ConnectionManager,
    key: ResponseKey,
    sent_at: chrono::DateTime<Utc>,
    limit: std::time::Duration,
) -> Option<Arc<ResponseEntry>> {
    let mut updates = manager.subscribe();
    let deadline = Instant::now() + limit;
    loop {
        if let Some(entry) = manager.store().get(key) {
            if entry.received_at >= sent_at {
                return Some(entry);
            }
        }
        match tokio::time::timeout_at(deadline, updates.changed()).await {
            Ok(true) => continue,
            _ => return None,
        }
    }
}
