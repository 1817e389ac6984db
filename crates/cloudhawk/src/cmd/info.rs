use crate::cmd::{collect_responses, connect, parse_duration, InfoArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_snapshot, OutputFormat};

pub async fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let wait = parse_duration(&args.wait)?;
    let manager = connect(&args.connect).await?;

    collect_responses(&manager, wait).await;
    let info = manager.snapshot();
    let address = manager.last_address();
    manager.disconnect().await;

    print_snapshot(&info, address.as_deref(), format);
    Ok(SUCCESS)
}
