// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/bt-tracker-rs

//! Indoor air monitor backend (Airthings Wave Plus)

use std::time::Duration;
use async_trait::async_trait;
use tracing::{debug, info};

use super::frame;
use super::{
    BackendInfo, Characteristic, DeviceKind, MacAddress, SensorBackend, SensorReading, SensorStatus,
    SharedRadio,
};
use crate::error::DeviceReadError;

/// Bluetooth SIG company identifier found in the advertisement
pub const AIRTHINGS_COMPANY_ID: u16 = 0x0334;

/// Characteristic holding the current sensor values
pub const CURRENT_VALUES_UUID: &str = "b42e2a68-ade7-11e4-89d3-123b93f75cba";

const SCAN_WINDOW: Duration = Duration::from_millis(100);
const MAX_SCANS: u32 = 50;

/// Extract the serial number from manufacturer data, if it is ours
pub fn parse_serial_number(data: &[u8]) -> Option<u32> {
    if data.len() < 6 || u16::from_le_bytes([data[0], data[1]]) != AIRTHINGS_COMPANY_ID {
        return None;
    }
    Some(u32::from_le_bytes([data[2], data[3], data[4], data[5]]))
}

/// Air monitor identified by its serial number
pub struct WavePlusBackend {
    serial_number: u32,
    address: Option<MacAddress>,
    radio: SharedRadio,
    status: SensorStatus,
    last: Option<SensorReading>,
}

impl WavePlusBackend {
    pub fn new(serial_number: u32, radio: SharedRadio) -> Self {
        Self {
            serial_number,
            address: None,
            radio,
            status: SensorStatus::Disconnected,
            last: None,
        }
    }

    /// Skip discovery and use a known address
    pub fn with_address(mut self, address: MacAddress) -> Self {
        self.address = Some(address);
        self
    }

    pub fn address(&self) -> Option<MacAddress> {
        self.address
    }

    async fn discover(&mut self) -> Result<MacAddress, DeviceReadError> {
        let mut radio = self.radio.lock().await;

        for scan in 1..=MAX_SCANS {
            let found = radio
                .scan(SCAN_WINDOW)
                .await?
                .into_iter()
                .find(|adv| {
                    adv.manufacturer_data
                        .as_deref()
                        .and_then(parse_serial_number)
                        == Some(self.serial_number)
                });

            if let Some(adv) = found {
                info!("Found air monitor {} at {} after {} scans", self.serial_number, adv.address, scan);
                return Ok(adv.address);
            }
        }

        Err(DeviceReadError::DeviceNotFound(format!(
            "no air monitor with serial number {} is advertising; check the serial number",
            self.serial_number
        )))
    }
}

#[async_trait]
impl SensorBackend for WavePlusBackend {
    fn kind(&self) -> DeviceKind { DeviceKind::AirMonitor }
    fn status(&self) -> SensorStatus { self.status }

    async fn connect(&mut self) -> Result<(), DeviceReadError> {
        let address = match self.address {
            Some(a) => a,
            None => {
                let a = self.discover().await?;
                self.address = Some(a);
                a
            }
        };

        let result = self.radio.lock().await.connect(address).await;
        self.status = if result.is_ok() { SensorStatus::Connected } else { SensorStatus::Error };
        result
    }

    async fn read(&mut self) -> Result<SensorReading, DeviceReadError> {
        let address = match (self.status, self.address) {
            (SensorStatus::Connected, Some(a)) => a,
            _ => return Err(DeviceReadError::NotConnected),
        };

        let raw = self
            .radio
            .lock()
            .await
            .read(address, Characteristic::Uuid(CURRENT_VALUES_UUID))
            .await?;
        debug!("air monitor raw frame {:02x?}", raw);

        let reading = frame::decode_bytes(&raw)?;
        self.last = Some(reading.clone());
        Ok(reading)
    }

    async fn disconnect(&mut self) -> Result<(), DeviceReadError> {
        self.status = SensorStatus::Disconnected;
        match self.address {
            Some(address) => self.radio.lock().await.disconnect(address).await,
            None => Ok(()),
        }
    }

    async fn identify(&mut self) -> Result<BackendInfo, DeviceReadError> {
        Ok(BackendInfo {
            name: format!("Wave Plus {}", self.serial_number),
            address: self.address,
            firmware: None,
        })
    }

    fn invalidate(&mut self) {
        self.last = None;
    }

    fn cached_reading(&self) -> SensorReading {
        self.last
            .clone()
            .unwrap_or_else(|| SensorReading::unavailable(DeviceKind::AirMonitor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::{radio, SimulatedRadio, SIMULATED_AIR_MONITOR};

    #[test]
    fn test_parse_serial_number() {
        let data = [0x34, 0x03, 0x39, 0x30, 0xA5, 0xAE, 0x09, 0x00];
        assert_eq!(parse_serial_number(&data), Some(0xAEA5_3039));

        let other_company = [0x4C, 0x00, 0x39, 0x30, 0xA5, 0xAE];
        assert_eq!(parse_serial_number(&other_company), None);
        assert_eq!(parse_serial_number(&[0x34, 0x03, 0x01]), None);
    }

    #[tokio::test]
    async fn test_discovery_caches_address() {
        let radio = radio::shared(SimulatedRadio::new(2930012345, 0.0));
        let mut backend = WavePlusBackend::new(2930012345, radio);
        assert_eq!(backend.address(), None);

        backend.connect().await.unwrap();
        let reading = backend.read().await.unwrap();
        backend.disconnect().await.unwrap();

        assert_eq!(backend.address(), Some(SIMULATED_AIR_MONITOR));
        assert_eq!(reading.len(), 7);
        assert_eq!(backend.cached_reading(), reading);
    }

    #[tokio::test]
    async fn test_unknown_serial_not_found() {
        let radio = radio::shared(SimulatedRadio::new(2930012345, 0.0));
        let mut backend = WavePlusBackend::new(42, radio);
        assert!(matches!(backend.connect().await, Err(DeviceReadError::DeviceNotFound(_))));
        assert_eq!(backend.status(), SensorStatus::Disconnected);
    }
}
