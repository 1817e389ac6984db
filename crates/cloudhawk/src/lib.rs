//! Client-side protocol engine for CloudHawk robotic mowers.
//!
//! Talks the proprietary "55AA" framing over Bluetooth Low Energy: encodes
//! commands, keeps a connection to one mower alive, collects the
//! notifications it pushes and decodes them into device snapshots.
//!
//! # Crate Structure
//!
//! - [`transport`]: BLE transport abstraction (`btleplug` backend behind the `btleplug` feature)
//! - [`frame`]: 55AA framing, command table and payload decoders
//! - [`peer`]: connection management, response store and snapshots (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use cloudhawk_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use cloudhawk_frame::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use cloudhawk_peer::*;
}
