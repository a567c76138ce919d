// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/bt-tracker-rs

//! Air monitor frame decoding
//!
//! The current-values characteristic of the air monitor returns a 20 byte
//! little-endian record laid out as `u8 u8 u8 u8 u16 u16 u16 u16 u16 u16 u16 u16`.
//! Decoding is pure: the same frame always yields the same reading.

use super::{DeviceKind, Parameter, SensorReading};
use crate::error::DecodeError;

/// Size of the raw frame on the wire
pub const AIR_FRAME_LEN: usize = 20;

/// The only protocol version this decoder understands
pub const SUPPORTED_VERSION: u8 = 1;

/// Largest radon value the firmware reports as a real measurement.
/// Anything above is the "not enough data yet" sentinel.
pub const RADON_MAX_VALID: u16 = 16383;

/// Raw air monitor record, one field per wire slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AirFrame {
    pub version: u8,
    /// Half-percent units
    pub humidity: u8,
    pub unused0: u8,
    pub unused1: u8,
    pub radon_short_term: u16,
    pub radon_long_term: u16,
    /// Centi-degrees Celsius
    pub temperature: u16,
    /// Half-hPa units
    pub pressure: u16,
    pub co2: u16,
    pub voc: u16,
    pub reserved0: u16,
    pub reserved1: u16,
}

impl AirFrame {
    /// Split a raw characteristic value into its fields
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != AIR_FRAME_LEN {
            return Err(DecodeError::FrameLength {
                expected: AIR_FRAME_LEN,
                actual: bytes.len(),
            });
        }
        let word = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);

        Ok(Self {
            version: bytes[0],
            humidity: bytes[1],
            unused0: bytes[2],
            unused1: bytes[3],
            radon_short_term: word(4),
            radon_long_term: word(6),
            temperature: word(8),
            pressure: word(10),
            co2: word(12),
            voc: word(14),
            reserved0: word(16),
            reserved1: word(18),
        })
    }

    /// Inverse of [`AirFrame::from_bytes`], used by the simulated radio
    pub fn to_bytes(&self) -> [u8; AIR_FRAME_LEN] {
        let mut out = [0u8; AIR_FRAME_LEN];
        out[0] = self.version;
        out[1] = self.humidity;
        out[2] = self.unused0;
        out[3] = self.unused1;
        let words = [
            self.radon_short_term,
            self.radon_long_term,
            self.temperature,
            self.pressure,
            self.co2,
            self.voc,
            self.reserved0,
            self.reserved1,
        ];
        for (i, w) in words.iter().enumerate() {
            out[4 + i * 2..6 + i * 2].copy_from_slice(&w.to_le_bytes());
        }
        out
    }
}

fn radon(raw: u16) -> Option<i64> {
    (raw <= RADON_MAX_VALID).then_some(raw as i64)
}

/// Convert a frame into typed, scaled values
pub fn decode(frame: &AirFrame) -> Result<SensorReading, DecodeError> {
    if frame.version != SUPPORTED_VERSION {
        return Err(DecodeError::UnsupportedProtocolVersion(frame.version));
    }

    let mut reading = SensorReading::unavailable(DeviceKind::AirMonitor)
        .with(Parameter::Humidity, frame.humidity as f64 / 2.0)
        .with(Parameter::Temperature, frame.temperature as f64 / 100.0)
        .with(Parameter::Pressure, frame.pressure as f64 / 50.0)
        .with(Parameter::Co2, frame.co2 as i64)
        .with(Parameter::Voc, frame.voc as i64);

    reading.set(Parameter::RadonShortTerm, radon(frame.radon_short_term).map(Into::into));
    reading.set(Parameter::RadonLongTerm, radon(frame.radon_long_term).map(Into::into));

    Ok(reading)
}

/// Parse and decode a raw characteristic value
pub fn decode_bytes(bytes: &[u8]) -> Result<SensorReading, DecodeError> {
    decode(&AirFrame::from_bytes(bytes)?)
}
