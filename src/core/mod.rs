//! Core functionality for the Ember poker
//! This module contains the core functionality for interfacing with the Ember mug

pub mod bluetooth;

// Re-export commonly used types
pub use bluetooth::{BluetoothManager, CommandBridge, ConnectionManager};
