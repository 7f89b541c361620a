//! GATT service and characteristic UUIDs

use uuid::Uuid;

// ----------------------------------------------------------------------------
// Service UUIDs
// ----------------------------------------------------------------------------

/// Service published by a peripheral exposing its own identity to peers
pub const SENDER_SERVICE_UUID: Uuid = Uuid::from_u128(0x2CD595E2_0078_40E7_AA33_6585E73FD70C);

/// Service published by a peripheral collecting identities from peers
pub const COLLECTOR_SERVICE_UUID: Uuid = Uuid::from_u128(0x1C2C56D0_19EB_413F_9F0A_BF71C48B9056);

// ----------------------------------------------------------------------------
// Characteristic UUIDs
// ----------------------------------------------------------------------------

/// Device identifier, UTF-8 text
pub const DEVICE_ID_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x51F4C7BC_3A1B_43CF_BB86_6F8B93446EDC);
