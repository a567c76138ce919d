// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/bt-tracker-rs

//! Sensor traits and common types

use std::fmt;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::MacAddress;
use crate::error::DeviceReadError;

/// Hardware families the daemon knows how to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Soil probe: light, temperature, moisture, conductivity, battery
    SoilProbe,
    /// Indoor air monitor: humidity, radon, temperature, pressure, CO2, VOC
    AirMonitor,
}

impl DeviceKind {
    /// Declared parameters, in publish order
    pub fn parameters(&self) -> &'static [Parameter] {
        match self {
            DeviceKind::SoilProbe => &[
                Parameter::Light,
                Parameter::Temperature,
                Parameter::Moisture,
                Parameter::Conductivity,
                Parameter::Battery,
            ],
            DeviceKind::AirMonitor => &[
                Parameter::Humidity,
                Parameter::RadonShortTerm,
                Parameter::RadonLongTerm,
                Parameter::Temperature,
                Parameter::Pressure,
                Parameter::Co2,
                Parameter::Voc,
            ],
        }
    }
}

/// A single measured quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parameter {
    Light,
    Temperature,
    Moisture,
    Conductivity,
    Battery,
    Humidity,
    RadonShortTerm,
    RadonLongTerm,
    Pressure,
    Co2,
    Voc,
}

impl Parameter {
    /// Key used in published payloads
    pub fn key(&self) -> &'static str {
        match self {
            Parameter::Light => "light",
            Parameter::Temperature => "temperature",
            Parameter::Moisture => "moisture",
            Parameter::Conductivity => "conductivity",
            Parameter::Battery => "battery",
            Parameter::Humidity => "humidity",
            Parameter::RadonShortTerm => "radon_st_avg",
            Parameter::RadonLongTerm => "radon_lt_avg",
            Parameter::Pressure => "pressure",
            Parameter::Co2 => "CO2_lvl",
            Parameter::Voc => "VOC_lvl",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Parameter::Light => "lux",
            Parameter::Temperature => "°C",
            Parameter::Moisture | Parameter::Battery => "%",
            Parameter::Conductivity => "µS/cm",
            Parameter::Humidity => "%rH",
            Parameter::RadonShortTerm | Parameter::RadonLongTerm => "Bq/m3",
            Parameter::Pressure => "hPa",
            Parameter::Co2 => "ppm",
            Parameter::Voc => "ppb",
        }
    }
}

/// Scalar sensor value, serialized as a plain JSON number
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Decimal(f64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Decimal(v)
    }
}

/// Normalized reading of one device for one cycle.
///
/// Every declared parameter of the device kind is always present; a `None`
/// value is an explicit "unavailable" marker and serializes as `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub kind: DeviceKind,
    pub timestamp: DateTime<Utc>,
    values: Vec<(Parameter, Option<Value>)>,
}

impl SensorReading {
    /// Reading with every parameter marked unavailable
    pub fn unavailable(kind: DeviceKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            values: kind.parameters().iter().map(|p| (*p, None)).collect(),
        }
    }

    /// Set a value; parameters not declared for the kind are ignored
    pub fn set(&mut self, parameter: Parameter, value: Option<Value>) {
        if let Some(slot) = self.values.iter_mut().find(|(p, _)| *p == parameter) {
            slot.1 = value;
        }
    }

    pub fn with(mut self, parameter: Parameter, value: impl Into<Value>) -> Self {
        self.set(parameter, Some(value.into()));
        self
    }

    pub fn get(&self, parameter: Parameter) -> Option<Value> {
        self.values
            .iter()
            .find(|(p, _)| *p == parameter)
            .and_then(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Parameter, Option<Value>)> + '_ {
        self.values.iter().copied()
    }

    /// True when every value is unavailable (device down)
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(|(_, v)| v.is_none())
    }

    /// True when every declared value is present
    pub fn is_complete(&self) -> bool {
        self.values.iter().all(|(_, v)| v.is_some())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

impl Serialize for SensorReading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (parameter, value) in &self.values {
            map.serialize_entry(parameter.key(), value)?;
        }
        map.end()
    }
}

/// Backend connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorStatus {
    Disconnected,
    Connected,
    Error,
}

/// What a device reports about itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    pub name: String,
    pub address: Option<MacAddress>,
    pub firmware: Option<String>,
}

/// Capability interface for one piece of sensor hardware.
///
/// The orchestrator only ever talks to devices through this trait. Every
/// call blocks on the transport and is bounded by the transport's own timeout.
#[async_trait]
pub trait SensorBackend: Send + Sync {
    /// Hardware family
    fn kind(&self) -> DeviceKind;

    /// Get current status
    fn status(&self) -> SensorStatus;

    /// Open a connection (discovering the device first if needed)
    async fn connect(&mut self) -> Result<(), DeviceReadError>;

    /// Read all declared parameters in one shot
    async fn read(&mut self) -> Result<SensorReading, DeviceReadError>;

    /// Release the connection
    async fn disconnect(&mut self) -> Result<(), DeviceReadError>;

    /// Report name, address and firmware (requires a connection)
    async fn identify(&mut self) -> Result<BackendInfo, DeviceReadError>;

    /// Drop all cached values so the next read is fresh
    fn invalidate(&mut self);

    /// Whatever the last reads managed to cache, possibly partial
    fn cached_reading(&self) -> SensorReading;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_reading_keeps_all_keys() {
        let reading = SensorReading::unavailable(DeviceKind::SoilProbe);
        assert!(reading.is_empty());
        assert!(!reading.is_complete());

        let json: serde_json::Value = serde_json::from_slice(&reading.to_json().unwrap()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 5);
        for key in ["light", "temperature", "moisture", "conductivity", "battery"] {
            assert!(obj[key].is_null(), "{} should be null", key);
        }
    }

    #[test]
    fn test_serialization_follows_declared_order() {
        let reading = SensorReading::unavailable(DeviceKind::AirMonitor)
            .with(Parameter::Voc, 120i64)
            .with(Parameter::Humidity, 45.5);

        let text = String::from_utf8(reading.to_json().unwrap()).unwrap();
        assert_eq!(
            text,
            r#"{"humidity":45.5,"radon_st_avg":null,"radon_lt_avg":null,"temperature":null,"pressure":null,"CO2_lvl":null,"VOC_lvl":120}"#
        );
    }

    #[test]
    fn test_undeclared_parameter_is_ignored() {
        let reading = SensorReading::unavailable(DeviceKind::SoilProbe).with(Parameter::Co2, 800i64);
        assert_eq!(reading.get(Parameter::Co2), None);
        assert_eq!(reading.len(), 5);
    }
}
