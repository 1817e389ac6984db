use std::time::Duration;

use cloudhawk_frame::{encode_command, CommandCode};
use cloudhawk_transport::{BtleTransport, Transport};
use serde::Serialize;

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

const ADAPTER_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Info,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub async fn run(_args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let checks = vec![
        bluetooth_adapter_check().await,
        codec_self_test(),
        compiled_features_check(),
    ];

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let overall = if has_fail { "fail" } else { "pass" };
    let output = DoctorOutput { checks, overall };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("cloudhawk doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<22} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Info => "INFO",
    }
}

async fn bluetooth_adapter_check() -> CheckResult {
    let name = "bluetooth_adapter".to_string();
    match tokio::time::timeout(ADAPTER_CHECK_TIMEOUT, BtleTransport::new()).await {
        Ok(Ok(transport)) => CheckResult {
            name,
            status: CheckStatus::Pass,
            detail: format!("{} adapter available", transport.transport_name()),
        },
        Ok(Err(err)) => CheckResult {
            name,
            status: CheckStatus::Fail,
            detail: err.to_string(),
        },
        Err(_) => CheckResult {
            name,
            status: CheckStatus::Fail,
            detail: format!("adapter check timed out after {ADAPTER_CHECK_TIMEOUT:?}"),
        },
    }
}

fn codec_self_test() -> CheckResult {
    const EXPECTED: [u8; 6] = [0x55, 0xaa, 0x02, 0x80, 0x83, 0x04];
    let name = "codec_self_test".to_string();
    match encode_command(CommandCode::GetBattery, &[]) {
        Ok(frame) if frame[..] == EXPECTED => CheckResult {
            name,
            status: CheckStatus::Pass,
            detail: format!("get_battery encodes to {}", hex::encode(&frame)),
        },
        Ok(frame) => CheckResult {
            name,
            status: CheckStatus::Fail,
            detail: format!(
                "get_battery encodes to {}, expected {}",
                hex::encode(&frame),
                hex::encode(EXPECTED)
            ),
        },
        Err(err) => CheckResult {
            name,
            status: CheckStatus::Fail,
            detail: err.to_string(),
        },
    }
}

fn compiled_features_check() -> CheckResult {
    let mut features = Vec::new();
    if cfg!(feature = "peer") {
        features.push("peer");
    }
    if cfg!(feature = "btleplug") {
        features.push("btleplug");
    }
    if cfg!(feature = "cli") {
        features.push("cli");
    }

    CheckResult {
        name: "compiled_features".to_string(),
        status: CheckStatus::Info,
        detail: features.join(", "),
    }
}
