use crate::cmd::{open_transport, parse_duration, ScanArgs};
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_devices, OutputFormat};

pub async fn run(args: ScanArgs, format: OutputFormat) -> CliResult<i32> {
    let duration = parse_duration(&args.duration)?;
    let transport = open_transport(duration).await?;

    let mut devices = transport
        .scan(duration)
        .await
        .map_err(|err| transport_error("scan failed", err))?;
    if !args.all {
        devices.retain(|device| device.name_contains(&args.name));
    }
    // Strongest signal first.
    devices.sort_by(|a, b| b.rssi.cmp(&a.rssi));

    print_devices(&devices, format);
    Ok(SUCCESS)
}
