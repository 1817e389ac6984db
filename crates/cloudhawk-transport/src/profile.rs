//! GATT service layouts used by CloudHawk mower firmware.

use uuid::Uuid;

/// One service with its write and notify characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattProfile {
    /// Short name for logs.
    pub name: &'static str,
    pub service: Uuid,
    /// Characteristic that receives outbound frames.
    pub write: Uuid,
    /// Characteristic that emits inbound frames.
    pub notify: Uuid,
}

/// Primary mower service.
pub const PRIMARY: GattProfile = GattProfile {
    name: "primary",
    service: Uuid::from_u128(0x0000ff12_0000_1000_8000_00805f9b34fb),
    write: Uuid::from_u128(0x0000ff01_0000_1000_8000_00805f9b34fb),
    notify: Uuid::from_u128(0x0000ff02_0000_1000_8000_00805f9b34fb),
};

/// SUMIC module layout found on some hardware revisions.
pub const SUMIC: GattProfile = GattProfile {
    name: "sumic",
    service: Uuid::from_u128(0x0000abf0_0000_1000_8000_00805f9b34fb),
    write: Uuid::from_u128(0x0000abf4_0000_1000_8000_00805f9b34fb),
    notify: Uuid::from_u128(0x0000abf3_0000_1000_8000_00805f9b34fb),
};

/// Profiles in lookup order.
pub const PROFILES: [GattProfile; 2] = [PRIMARY, SUMIC];

/// Pick the first profile whose service and both characteristics are present.
///
/// `characteristics` yields `(service_uuid, characteristic_uuid)` pairs as
/// reported by service discovery.
pub fn select_profile<I>(characteristics: I) -> Option<GattProfile>
where
    I: IntoIterator<Item = (Uuid, Uuid)>,
{
    let found: Vec<(Uuid, Uuid)> = characteristics.into_iter().collect();
    PROFILES.into_iter().find(|profile| {
        let has = |uuid: Uuid| {
            found
                .iter()
                .any(|&(service, chr)| service == profile.service && chr == uuid)
        };
        has(profile.write) && has(profile.notify)
    })
}
