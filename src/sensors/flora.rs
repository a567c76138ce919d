// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/bt-tracker-rs

//! Soil probe backend (Mi Flora style plant sensor)

use async_trait::async_trait;
use tracing::debug;

use super::registry::FirmwareVersion;
use super::{
    BackendInfo, Characteristic, DeviceKind, MacAddress, Parameter, SensorBackend, SensorReading,
    SensorStatus, SharedRadio,
};
use crate::error::DeviceReadError;

const HANDLE_NAME: u16 = 0x03;
const HANDLE_FIRMWARE_BATTERY: u16 = 0x38;
const HANDLE_MODE_CHANGE: u16 = 0x33;
const HANDLE_DATA: u16 = 0x35;

const MODE_CHANGE_REALTIME: [u8; 2] = [0xA0, 0x1F];
const DATA_LEN: usize = 16;
const NOT_READY: [u8; 10] = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x99, 0x88, 0x77, 0x66];

/// Firmware from which the realtime mode must be enabled before reading
const MODE_CHANGE_SINCE: FirmwareVersion = FirmwareVersion::new(2, 6, 6);

/// Decoded realtime data characteristic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloraData {
    /// °C
    pub temperature: f64,
    /// lux
    pub light: u32,
    /// %
    pub moisture: u8,
    /// µS/cm
    pub conductivity: u16,
}

/// Parse the 16 byte realtime data frame
pub fn parse_data(bytes: &[u8]) -> Result<FloraData, DeviceReadError> {
    if bytes.len() != DATA_LEN {
        return Err(DeviceReadError::MalformedResponse(format!(
            "data frame is {} bytes, expected {}",
            bytes.len(),
            DATA_LEN
        )));
    }
    if bytes.starts_with(&NOT_READY) {
        return Err(DeviceReadError::MalformedResponse("sensor not ready".to_string()));
    }

    Ok(FloraData {
        temperature: i16::from_le_bytes([bytes[0], bytes[1]]) as f64 / 10.0,
        light: u32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]),
        moisture: bytes[7],
        conductivity: u16::from_le_bytes([bytes[8], bytes[9]]),
    })
}

/// Parse the battery/firmware characteristic: byte 0 battery, bytes 2.. firmware
pub fn parse_firmware_battery(bytes: &[u8]) -> Result<(u8, String), DeviceReadError> {
    if bytes.len() < 7 {
        return Err(DeviceReadError::MalformedResponse(format!(
            "firmware frame is {} bytes, expected 7",
            bytes.len()
        )));
    }
    let firmware = String::from_utf8_lossy(&bytes[2..])
        .trim_end_matches('\0')
        .trim()
        .to_string();
    Ok((bytes[0], firmware))
}

/// Soil probe at a fixed hardware address
pub struct FloraBackend {
    address: MacAddress,
    radio: SharedRadio,
    status: SensorStatus,
    name: Option<String>,
    firmware: Option<String>,
    battery: Option<u8>,
    data: Option<FloraData>,
}

impl FloraBackend {
    pub fn new(address: MacAddress, radio: SharedRadio) -> Self {
        Self {
            address,
            radio,
            status: SensorStatus::Disconnected,
            name: None,
            firmware: None,
            battery: None,
            data: None,
        }
    }

    pub fn address(&self) -> MacAddress {
        self.address
    }

    fn needs_mode_change(&self) -> bool {
        self.firmware
            .as_deref()
            .and_then(|f| f.parse::<FirmwareVersion>().ok())
            .map_or(true, |v| v >= MODE_CHANGE_SINCE)
    }

    async fn fill_firmware_battery(&mut self) -> Result<(), DeviceReadError> {
        let raw = self
            .radio
            .lock()
            .await
            .read(self.address, Characteristic::Handle(HANDLE_FIRMWARE_BATTERY))
            .await?;
        let (battery, firmware) = parse_firmware_battery(&raw)?;
        self.battery = Some(battery);
        self.firmware = Some(firmware);
        Ok(())
    }
}

#[async_trait]
impl SensorBackend for FloraBackend {
    fn kind(&self) -> DeviceKind { DeviceKind::SoilProbe }
    fn status(&self) -> SensorStatus { self.status }

    async fn connect(&mut self) -> Result<(), DeviceReadError> {
        let result = self.radio.lock().await.connect(self.address).await;
        self.status = if result.is_ok() { SensorStatus::Connected } else { SensorStatus::Error };
        result
    }

    async fn read(&mut self) -> Result<SensorReading, DeviceReadError> {
        if self.status != SensorStatus::Connected {
            return Err(DeviceReadError::NotConnected);
        }

        self.fill_firmware_battery().await?;

        let raw = {
            let mut radio = self.radio.lock().await;
            if self.needs_mode_change() {
                radio.write(self.address, HANDLE_MODE_CHANGE, &MODE_CHANGE_REALTIME).await?;
            }
            radio.read(self.address, Characteristic::Handle(HANDLE_DATA)).await?
        };
        let data = parse_data(&raw)?;
        debug!("{} raw data {:02x?} -> {:?}", self.address, raw, data);
        self.data = Some(data);

        Ok(self.cached_reading())
    }

    async fn disconnect(&mut self) -> Result<(), DeviceReadError> {
        self.status = SensorStatus::Disconnected;
        self.radio.lock().await.disconnect(self.address).await
    }

    async fn identify(&mut self) -> Result<BackendInfo, DeviceReadError> {
        if self.name.is_none() {
            let raw = self
                .radio
                .lock()
                .await
                .read(self.address, Characteristic::Handle(HANDLE_NAME))
                .await?;
            self.name = Some(String::from_utf8_lossy(&raw).trim_end_matches('\0').to_string());
        }
        if self.firmware.is_none() {
            self.fill_firmware_battery().await?;
        }

        Ok(BackendInfo {
            name: self.name.clone().unwrap_or_default(),
            address: Some(self.address),
            firmware: self.firmware.clone(),
        })
    }

    fn invalidate(&mut self) {
        self.battery = None;
        self.data = None;
    }

    fn cached_reading(&self) -> SensorReading {
        let mut reading = SensorReading::unavailable(DeviceKind::SoilProbe);
        if let Some(data) = self.data {
            reading.set(Parameter::Light, Some((data.light as i64).into()));
            reading.set(Parameter::Temperature, Some(data.temperature.into()));
            reading.set(Parameter::Moisture, Some((data.moisture as i64).into()));
            reading.set(Parameter::Conductivity, Some((data.conductivity as i64).into()));
        }
        if let Some(battery) = self.battery {
            reading.set(Parameter::Battery, Some((battery as i64).into()));
        }
        reading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::{radio, SimulatedRadio, Value};

    #[test]
    fn test_parse_data() {
        let bytes = [
            0xEA, 0x00, 0x00, // 23.4 °C
            0x2C, 0x01, 0x00, 0x00, // 300 lux
            0x28, // 40 %
            0x5E, 0x01, // 350 µS/cm
            0x02, 0x3C, 0x00, 0xFB, 0x34, 0x9B,
        ];
        let data = parse_data(&bytes).unwrap();
        assert_eq!(data.temperature, 23.4);
        assert_eq!(data.light, 300);
        assert_eq!(data.moisture, 40);
        assert_eq!(data.conductivity, 350);
    }

    #[test]
    fn test_parse_negative_temperature() {
        let mut bytes = [0u8; 16];
        bytes[..2].copy_from_slice(&(-35i16).to_le_bytes());
        assert_eq!(parse_data(&bytes).unwrap().temperature, -3.5);
    }

    #[test]
    fn test_not_ready_frame_is_malformed() {
        let mut bytes = [0u8; 16];
        bytes[..10].copy_from_slice(&NOT_READY);
        assert!(matches!(parse_data(&bytes), Err(DeviceReadError::MalformedResponse(_))));
        assert!(matches!(parse_data(&bytes[..4]), Err(DeviceReadError::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_firmware_battery() {
        let (battery, firmware) = parse_firmware_battery(&[0x64, 0x10, b'3', b'.', b'2', b'.', b'2']).unwrap();
        assert_eq!(battery, 100);
        assert_eq!(firmware, "3.2.2");
    }

    #[tokio::test]
    async fn test_read_and_invalidate() {
        let radio = radio::shared(SimulatedRadio::new(1, 0.0));
        let mut backend = FloraBackend::new("C4:7C:8D:6A:3E:12".parse().unwrap(), radio);

        assert!(matches!(backend.read().await, Err(DeviceReadError::NotConnected)));

        backend.connect().await.unwrap();
        let reading = backend.read().await.unwrap();
        backend.disconnect().await.unwrap();
        assert!(reading.is_complete());
        assert!(matches!(reading.get(Parameter::Battery), Some(Value::Integer(_))));

        backend.invalidate();
        assert!(backend.cached_reading().is_empty());
    }

    #[tokio::test]
    async fn test_identify_reports_firmware() {
        let radio = radio::shared(SimulatedRadio::new(1, 0.0));
        let mut backend = FloraBackend::new("C4:7C:8D:6A:3E:12".parse().unwrap(), radio);
        backend.connect().await.unwrap();

        let info = backend.identify().await.unwrap();
        assert_eq!(info.name, "Flower care");
        assert_eq!(info.firmware.as_deref(), Some("3.2.2"));
        assert_eq!(info.address, Some(backend.address()));
    }
}
