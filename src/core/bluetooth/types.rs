//! Defines shared data structures for the Bluetooth module.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::core::bluetooth::constants::*;

/// Stable identifier of the one mug this process talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceIdentity(Uuid);

impl DeviceIdentity {
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for DeviceIdentity {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for DeviceIdentity {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated().to_string().to_uppercase())
    }
}

/// Progress of the scan -> connect -> discover pipeline.
///
/// Variants are ordered, so `state >= ConnectionState::Connected` reads as
/// "a link to the mug is up".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectionState {
    Disconnected,
    Scanning,
    Connecting,
    Connected,
    DiscoveringServices,
    DiscoveringCharacteristics,
    Ready,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        *self >= ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Scanning => "scanning",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::DiscoveringServices => "discovering services",
            Self::DiscoveringCharacteristics => "discovering characteristics",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Semantic name of an Ember characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicKind {
    DeviceName,
    CurrentTemperature,
    TargetTemperature,
    TemperatureUnit,
    LiquidLevel,
    BatteryLevel,
    LiquidState,
    MugId,
    PairingChallenge,
    PairingSecretWrite,
    PushEvent,
    Statistics,
    Rgb,
}

impl CharacteristicKind {
    pub const ALL: [CharacteristicKind; 13] = [
        Self::DeviceName,
        Self::CurrentTemperature,
        Self::TargetTemperature,
        Self::TemperatureUnit,
        Self::LiquidLevel,
        Self::BatteryLevel,
        Self::LiquidState,
        Self::MugId,
        Self::PairingChallenge,
        Self::PairingSecretWrite,
        Self::PushEvent,
        Self::Statistics,
        Self::Rgb,
    ];

    /// Wire identifier of this characteristic
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::DeviceName => UUID_DEVICE_NAME,
            Self::CurrentTemperature => UUID_CURRENT_TEMPERATURE,
            Self::TargetTemperature => UUID_TARGET_TEMPERATURE,
            Self::TemperatureUnit => UUID_TEMPERATURE_UNIT,
            Self::LiquidLevel => UUID_LIQUID_LEVEL,
            Self::BatteryLevel => UUID_BATTERY_LEVEL,
            Self::LiquidState => UUID_LIQUID_STATE,
            Self::MugId => UUID_MUG_ID,
            Self::PairingChallenge => UUID_PAIRING_CHALLENGE,
            Self::PairingSecretWrite => UUID_PAIRING_SECRET_WRITE,
            Self::PushEvent => UUID_PUSH_EVENT,
            Self::Statistics => UUID_STATISTICS,
            Self::Rgb => UUID_RGB,
        }
    }

    /// Classifies a wire identifier, `None` for anything outside the known table
    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.uuid() == uuid)
    }
}

impl fmt::Display for CharacteristicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Transport-assigned handle of a discovered service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceHandle(pub u32);

/// Transport-assigned handle of a discovered characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle(pub u32);

/// Tags one read or write so its completion can be told apart from a late
/// answer to an earlier, abandoned request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

/// Temperature in hundredths of a degree Celsius (5723 is 57.23°C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temperature(pub u16);

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 24-bit colour of the mug's light, `0xRRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(u32);

impl Rgb {
    pub const MAX: u32 = 0x00FF_FFFF;

    /// Builds a colour from a 24-bit value, `None` if any higher bit is set
    pub fn new(value: u32) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    /// Keeps the low 24 bits of `value`
    pub fn from_bits_truncate(value: u32) -> Self {
        Self(value & Self::MAX)
    }

    pub fn from_components(red: u8, green: u8, blue: u8) -> Self {
        Self(u32::from(red) << 16 | u32::from(green) << 8 | u32::from(blue))
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn components(&self) -> (u8, u8, u8) {
        ((self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("expected six hexadecimal digits (RRGGBB), got {0:?}")]
pub struct ParseRgbError(String);

impl FromStr for Rgb {
    type Err = ParseRgbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseRgbError(s.to_string()));
        }
        u32::from_str_radix(digits, 16)
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| ParseRgbError(s.to_string()))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}", self.0)
    }
}

/// Battery reading: charge in percent and whether the mug sits on its coaster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryStatus {
    pub percent: u8,
    pub charging: bool,
}

impl fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.charging {
            write!(f, "{}% (charging)", self.percent)
        } else {
            write!(f, "{}%", self.percent)
        }
    }
}
