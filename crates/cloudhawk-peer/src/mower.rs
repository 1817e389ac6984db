use std::sync::Arc;

use cloudhawk_frame::CommandCode;
use cloudhawk_transport::Transport;
use tracing::{error, info, warn};

use crate::command::MowerCommand;
use crate::config::MowerConfig;
use crate::error::Result;
use crate::info::DeviceInfo;
use crate::manager::ConnectionManager;
use crate::signal::UpdateReceiver;
use crate::state::ConnectionState;

/// Host-facing handle to one mower.
///
/// Operations report success as `bool` and log the cause of failures;
/// [`Mower::manager`] exposes the underlying `Result`-returning API.
#[derive(Debug, Clone)]
pub struct Mower {
    manager: ConnectionManager,
}

impl Mower {
    pub fn new(transport: Arc<dyn Transport>, config: MowerConfig) -> Self {
        Self {
            manager: ConnectionManager::new(transport, config),
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Connect once; see [`ConnectionManager::connect`].
    pub async fn connect(&self, address: Option<&str>) -> bool {
        match self.manager.connect(address).await {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "failed to connect to mower");
                false
            }
        }
    }

    /// Connect in the background, retrying until the first success.
    pub fn spawn_initial_connect(&self, address: Option<String>) {
        self.manager.spawn_initial_connect(address);
    }

    pub async fn disconnect(&self) {
        self.manager.disconnect().await;
    }

    pub async fn is_connected(&self) -> bool {
        self.manager.is_connected().await
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Send a mowing command by name: `start`, `start_once`, `spiral`,
    /// `edge`, `stop` or `dock`.
    pub async fn send_named_command(&self, name: &str) -> bool {
        let command = match name.parse::<MowerCommand>() {
            Ok(command) => command,
            Err(err) => {
                warn!(error = %err, "rejected command");
                return false;
            }
        };
        self.report(command.name(), self.send_command(command).await)
    }

    pub async fn send_command(&self, command: MowerCommand) -> Result<()> {
        self.manager.send(command.code()).await?;
        info!(command = %command, "mower command sent");
        Ok(())
    }

    /// Send any protocol command; the response lands in the store.
    pub async fn request(&self, command: CommandCode) -> bool {
        self.report(command.name(), self.manager.send(command).await)
    }

    pub fn snapshot(&self) -> DeviceInfo {
        self.manager.snapshot()
    }

    /// Wake-ups for new data or state changes; re-read [`Mower::snapshot`].
    pub fn subscribe(&self) -> UpdateReceiver {
        self.manager.subscribe()
    }

    fn report(&self, name: &str, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                error!(command = name, error = %err, "failed to send command");
                false
            }
        }
    }
}
