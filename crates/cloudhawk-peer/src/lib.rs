//! Connection management for CloudHawk mowers.
//!
//! This is the "just works" layer. Connect to a mower, keep the link alive,
//! collect its notifications into a response store and read decoded
//! snapshots, with one call per operation.

pub mod command;
pub mod config;
pub mod error;
pub mod info;
pub mod listener;
pub mod manager;
pub mod mower;
pub mod signal;
pub mod state;
pub mod store;
pub mod validate;

#[cfg(test)]
mod mock;

pub use command::MowerCommand;
pub use config::MowerConfig;
pub use error::{PeerError, Result};
pub use info::DeviceInfo;
pub use listener::{handle_notification, NotificationListener};
pub use manager::{ConnectionManager, BOOTSTRAP_SEQUENCE};
pub use mower::Mower;
pub use signal::{UpdateReceiver, UpdateSignal};
pub use state::ConnectionState;
pub use store::{ResponseEntry, ResponseStore};
pub use validate::{validate_device, ValidatedDevice};
