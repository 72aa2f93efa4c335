//! Constants used throughout the application
//! This module contains the wire identifiers of the Ember mug, the pairing
//! secret and the default timeouts used by the command layer.

use uuid::Uuid;

/// The UUID of the Ember command service
pub const UUID_EMBER_SERVICE: Uuid = Uuid::from_u128(0xfc543622_236c_4c94_8fa9_944a3e5353fa);

/// Ember characteristic UUIDs, all sharing the `FC54xxxx-236C-4C94-8FA9-944A3E5353FA` base
pub const UUID_DEVICE_NAME: Uuid = Uuid::from_u128(0xfc540001_236c_4c94_8fa9_944a3e5353fa);
pub const UUID_CURRENT_TEMPERATURE: Uuid = Uuid::from_u128(0xfc540002_236c_4c94_8fa9_944a3e5353fa);
pub const UUID_TARGET_TEMPERATURE: Uuid = Uuid::from_u128(0xfc540003_236c_4c94_8fa9_944a3e5353fa);
pub const UUID_TEMPERATURE_UNIT: Uuid = Uuid::from_u128(0xfc540004_236c_4c94_8fa9_944a3e5353fa);
pub const UUID_LIQUID_LEVEL: Uuid = Uuid::from_u128(0xfc540005_236c_4c94_8fa9_944a3e5353fa);
pub const UUID_BATTERY_LEVEL: Uuid = Uuid::from_u128(0xfc540007_236c_4c94_8fa9_944a3e5353fa);
pub const UUID_LIQUID_STATE: Uuid = Uuid::from_u128(0xfc540008_236c_4c94_8fa9_944a3e5353fa);
pub const UUID_MUG_ID: Uuid = Uuid::from_u128(0xfc54000d_236c_4c94_8fa9_944a3e5353fa);
pub const UUID_PAIRING_CHALLENGE: Uuid = Uuid::from_u128(0xfc54000e_236c_4c94_8fa9_944a3e5353fa);
pub const UUID_PAIRING_SECRET_WRITE: Uuid = Uuid::from_u128(0xfc54000f_236c_4c94_8fa9_944a3e5353fa);
pub const UUID_PUSH_EVENT: Uuid = Uuid::from_u128(0xfc540012_236c_4c94_8fa9_944a3e5353fa);
pub const UUID_STATISTICS: Uuid = Uuid::from_u128(0xfc540013_236c_4c94_8fa9_944a3e5353fa);
pub const UUID_RGB: Uuid = Uuid::from_u128(0xfc540014_236c_4c94_8fa9_944a3e5353fa);

/// Secret written to the pairing characteristic, transmitted unmodified
pub const PAIRING_SECRET: [u8; 20] = [
    0xBA, 0x37, 0x89, 0x40, 0x51, 0x0A, 0x13, 0x68, 0x85, 0xE8, 0xD7, 0x73, 0xA5, 0xE0, 0x3E,
    0x1C, 0x3F, 0xF2, 0xF5, 0xFA,
];

/// Default time allowed for scan, connect and discovery in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default time allowed for a single read or write completion in milliseconds
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5000;

/// Default time allowed for each step of the pairing handshake in milliseconds
pub const DEFAULT_PAIRING_TIMEOUT_MS: u64 = 5000;
