use cloudhawk_peer::Mower;
use tracing::info;

use crate::cmd::{open_transport, WatchArgs};
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_snapshot, OutputFormat};

pub async fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.connect.config()?;
    let transport = open_transport(config.scan_time).await?;
    let mower = Mower::new(transport, config);

    let mut updates = mower.subscribe();
    mower.spawn_initial_connect(args.connect.address.clone());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut printed = 0usize;
    let outcome = loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                break signal.map(|()| {
                    info!("interrupted, disconnecting");
                }).map_err(|err| {
                    CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
                });
            }
            changed = updates.changed() => {
                if !changed {
                    break Ok(());
                }
                let address = mower.manager().last_address();
                print_snapshot(&mower.snapshot(), address.as_deref(), format);
                printed = printed.saturating_add(1);

                if args.count.is_some_and(|count| printed >= count) {
                    break Ok(());
                }
            }
        }
    };

    mower.disconnect().await;
    outcome.map(|()| SUCCESS)
}
