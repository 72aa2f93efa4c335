//! Wire encoding of the values exchanged with the mug

use crate::core::bluetooth::constants::PAIRING_SECRET;
use crate::core::bluetooth::types::{BatteryStatus, Rgb, Temperature};

/// Payload shorter than the value it should carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("payload too short: expected {expected} bytes, got {actual}")]
pub struct ShortPayload {
    pub expected: usize,
    pub actual: usize,
}

fn require(data: &[u8], expected: usize) -> Result<(), ShortPayload> {
    if data.len() < expected {
        return Err(ShortPayload { expected, actual: data.len() });
    }
    Ok(())
}

pub fn encode_temperature(temperature: Temperature) -> [u8; 2] {
    temperature.0.to_le_bytes()
}

pub fn decode_temperature(data: &[u8]) -> Result<Temperature, ShortPayload> {
    require(data, 2)?;
    Ok(Temperature(u16::from_le_bytes([data[0], data[1]])))
}

/// The mug keeps the colour as `[R, G, B, 0]`. Read as a little-endian word
/// that is `0x00BBGGRR`; one byte swap plus an 8-bit shift yields `0xRRGGBB`.
pub fn encode_rgb(rgb: Rgb) -> [u8; 4] {
    (rgb.value() << 8).swap_bytes().to_le_bytes()
}

pub fn decode_rgb(data: &[u8]) -> Result<Rgb, ShortPayload> {
    require(data, 4)?;
    let word = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    Ok(Rgb::from_bits_truncate(word.swap_bytes() >> 8))
}

pub fn decode_liquid_level(data: &[u8]) -> Result<u8, ShortPayload> {
    require(data, 1)?;
    Ok(data[0])
}

pub fn decode_battery(data: &[u8]) -> Result<BatteryStatus, ShortPayload> {
    require(data, 2)?;
    Ok(BatteryStatus {
        percent: data[0],
        charging: data[1] != 0,
    })
}

pub fn decode_device_name(data: &[u8]) -> String {
    String::from_utf8_lossy(data).trim_end_matches('\0').to_string()
}

pub fn pairing_secret() -> &'static [u8] {
    &PAIRING_SECRET
}
