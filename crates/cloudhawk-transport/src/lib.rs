//! BLE transport abstraction for CloudHawk mowers.
//!
//! Provides a unified async interface over the host Bluetooth stack:
//! - [`Transport`] scans for peripherals and opens links
//! - [`Link`] writes frames and streams notifications for one peripheral
//!
//! This is the lowest layer of cloudhawk. The `btleplug` feature enables the
//! platform backend ([`BtleTransport`]); without it the crate only carries the
//! traits, so higher layers can be exercised against in-process fakes.

pub mod error;
pub mod profile;
pub mod traits;

#[cfg(feature = "btleplug")]
pub mod btle;

pub use error::{Result, TransportError};
pub use profile::{GattProfile, PRIMARY, PROFILES, SUMIC};
pub use traits::{DiscoveredDevice, Link, NotificationStream, Transport};

#[cfg(feature = "btleplug")]
pub use btle::{BtleLink, BtleTransport};
