use cloudhawk_peer::{validate_device, MowerConfig};

use crate::cmd::{open_transport, parse_duration, ValidateArgs};
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

pub async fn run(args: ValidateArgs, format: OutputFormat) -> CliResult<i32> {
    let config = MowerConfig {
        connect_timeout: parse_duration(&args.timeout)?,
        validation_settle: parse_duration(&args.settle)?,
        ..MowerConfig::default()
    };
    let transport = open_transport(config.connect_timeout).await?;

    let device = validate_device(transport, &args.address, &config)
        .await
        .map_err(|err| peer_error("validation failed", err))?;

    match format {
        OutputFormat::Json => print_json(&device),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Validated:");
            println!("  Title:    {}", device.title);
            println!("  Address:  {}", device.address);
            println!("  Firmware: {}", device.info.firmware_version);
        }
        OutputFormat::Raw => println!("{}", device.title),
    }
    Ok(SUCCESS)
}
