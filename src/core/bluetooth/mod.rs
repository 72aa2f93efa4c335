//! Bluetooth functionality for the Ember mug
//! This module handles all bluetooth operations including scanning,
//! connecting, discovering and issuing commands to the mug.

mod backend;
pub mod codec;
mod commands;
mod connection;
pub mod constants;
mod error;
mod manager;
mod notification;
mod registry;
mod scanner;
mod transport;
mod types;

// Re-export types that should be publicly accessible
pub use backend::BluestTransport;
pub use commands::{CommandBridge, CommandTimeouts};
pub use connection::ConnectionManager;
pub use constants::*; // Re-export all constants
pub use error::{BridgeError, BridgeResult};
pub use manager::BluetoothManager;
pub use registry::CharacteristicRegistry;
pub use scanner::device_identifier;
pub use transport::{EventReceiver, EventSender, Transport, TransportEvent, event_channel};
pub use types::{
    BatteryStatus, CharacteristicHandle, CharacteristicKind, ConnectionState, DeviceIdentity,
    ParseRgbError, RequestId, Rgb, ServiceHandle, Temperature,
};
