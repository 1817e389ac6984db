use cloudhawk_peer::MowerCommand;
use serde::Serialize;

use crate::cmd::{connect, SendArgs};
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct SendOutput<'a> {
    command: &'a str,
    address: Option<String>,
    sent: bool,
}

pub async fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    // Reject unknown names before touching the radio.
    let command: MowerCommand = args
        .command
        .parse()
        .map_err(|err| peer_error("invalid command", err))?;

    let manager = connect(&args.connect).await?;
    let result = manager.send(command.code()).await;
    let address = manager.last_address();
    manager.disconnect().await;
    result.map_err(|err| peer_error("send failed", err))?;

    let out = SendOutput {
        command: command.name(),
        address,
        sent: true,
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!(
                "sent {} to {}",
                out.command,
                out.address.as_deref().unwrap_or("mower")
            );
        }
        OutputFormat::Raw => println!("{}", out.command),
    }
    Ok(SUCCESS)
}
