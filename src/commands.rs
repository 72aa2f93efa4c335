//! Command-line commands
//! This module defines the commands accepted on the command line and runs
//! them against a connected mug.

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};

use crate::core::bluetooth::{CommandBridge, DeviceIdentity, Rgb, Temperature, Transport};

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Pair with an Ember device.
    Pair {
        /// UUID of Ember device.
        uuid: DeviceIdentity,
    },
    /// Get data from the Ember device.
    Get {
        /// UUID of Ember device.
        uuid: DeviceIdentity,
        /// Datum to read.
        datum: GetDatum,
    },
    /// Set data on the Ember device.
    Set {
        /// UUID of Ember device.
        uuid: DeviceIdentity,
        /// Datum to write.
        datum: SetDatum,
        /// Temperature in hundredths of a degree Celsius (5723 for 57.23°C),
        /// or a colour as six hexadecimal digits (RRGGBB).
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GetDatum {
    /// Target temperature
    Target,
    /// Current drink temperature
    Current,
    /// Liquid level
    Level,
    /// Light colour
    Rgb,
    /// Battery charge
    Battery,
    /// Device name
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SetDatum {
    Target,
    Rgb,
}

/// A validated request, ready to run once the mug is connected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Pair,
    Get(GetDatum),
    SetTarget(Temperature),
    SetRgb(Rgb),
}

impl Command {
    pub fn identity(&self) -> DeviceIdentity {
        match self {
            Self::Pair { uuid } | Self::Get { uuid, .. } | Self::Set { uuid, .. } => *uuid,
        }
    }

    /// Checks the arguments before any Bluetooth activity starts
    pub fn action(&self) -> Result<Action> {
        match self {
            Self::Pair { .. } => Ok(Action::Pair),
            Self::Get { datum, .. } => Ok(Action::Get(*datum)),
            Self::Set { datum: SetDatum::Target, value, .. } => {
                let raw: u16 = value
                    .parse()
                    .with_context(|| format!("invalid temperature {:?}, expected 0-65535", value))?;
                Ok(Action::SetTarget(Temperature(raw)))
            }
            Self::Set { datum: SetDatum::Rgb, value, .. } => Ok(Action::SetRgb(value.parse()?)),
        }
    }
}

/// Runs one action. Returns what should be printed on success.
pub async fn execute<T: Transport + 'static>(
    bridge: &CommandBridge<T>,
    action: Action,
) -> Result<Option<String>> {
    let output = match action {
        Action::Pair => {
            bridge.pair().await?;
            None
        }
        Action::Get(GetDatum::Target) => Some(bridge.get_target_temperature().await?.to_string()),
        Action::Get(GetDatum::Current) => Some(bridge.get_current_temperature().await?.to_string()),
        Action::Get(GetDatum::Level) => Some(bridge.get_liquid_level().await?.to_string()),
        Action::Get(GetDatum::Rgb) => Some(bridge.get_rgb().await?.to_string()),
        Action::Get(GetDatum::Battery) => Some(bridge.get_battery().await?.to_string()),
        Action::Get(GetDatum::Name) => Some(bridge.get_device_name().await?),
        Action::SetTarget(temperature) => {
            bridge.set_target_temperature(temperature).await?;
            None
        }
        Action::SetRgb(rgb) => {
            bridge.set_rgb(rgb).await?;
            None
        }
    };
    Ok(output)
}
