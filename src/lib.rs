//! Ember poker library
//! Pairs with and controls an Ember temperature-controlled mug over Bluetooth LE.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod logging;

pub use crate::core::bluetooth;
