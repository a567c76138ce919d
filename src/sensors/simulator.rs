// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/bt-tracker-rs

//! Simulated radio for demo/testing

use std::time::Duration;
use async_trait::async_trait;
use rand::prelude::*;

use super::frame::AirFrame;
use super::waveplus::{AIRTHINGS_COMPANY_ID, CURRENT_VALUES_UUID};
use super::{Advertisement, Characteristic, MacAddress, Radio};
use crate::error::DeviceReadError;

/// Address the simulated air monitor advertises from
pub const SIMULATED_AIR_MONITOR: MacAddress = MacAddress::new([0x58, 0x93, 0xD8, 0x00, 0x00, 0x01]);

/// Simulated radio adapter.
///
/// Answers like a soil probe at any address and like an air monitor at
/// [`SIMULATED_AIR_MONITOR`], failing a fraction of operations.
pub struct SimulatedRadio {
    rng: StdRng,
    serial_number: u32,
    failure_rate: f64,
    connected: Option<MacAddress>,
    time: f64,
}

impl SimulatedRadio {
    pub fn new(serial_number: u32, failure_rate: f64) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            serial_number,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            connected: None,
            time: 0.0,
        }
    }

    fn maybe_fail(&mut self, what: &str) -> Result<(), DeviceReadError> {
        if self.rng.gen_bool(self.failure_rate) {
            Err(DeviceReadError::Transport(format!("simulated {} failure", what)))
        } else {
            Ok(())
        }
    }

    fn flora_data(&mut self) -> Vec<u8> {
        self.time += 1.0;
        let temperature = (215.0 + 30.0 * (self.time / 12.0).sin() + self.rng.gen_range(-5.0..5.0)) as i16;
        let light: u32 = self.rng.gen_range(50..20_000);
        let moisture: u8 = self.rng.gen_range(15..60);
        let conductivity: u16 = self.rng.gen_range(100..900);

        let mut out = vec![0u8; 16];
        out[0..2].copy_from_slice(&temperature.to_le_bytes());
        out[3..7].copy_from_slice(&light.to_le_bytes());
        out[7] = moisture;
        out[8..10].copy_from_slice(&conductivity.to_le_bytes());
        out
    }

    fn air_frame(&mut self) -> Vec<u8> {
        // Freshly booted monitors report the radon sentinel for a while
        let radon_lt = if self.rng.gen_bool(0.1) { 0xFFFF } else { self.rng.gen_range(20..150) };
        AirFrame {
            version: 1,
            humidity: self.rng.gen_range(60..120),
            radon_short_term: self.rng.gen_range(10..200),
            radon_long_term: radon_lt,
            temperature: self.rng.gen_range(1900..2500),
            pressure: self.rng.gen_range(49_000..51_500),
            co2: self.rng.gen_range(400..1600),
            voc: self.rng.gen_range(30..600),
            ..Default::default()
        }
        .to_bytes()
        .to_vec()
    }
}

#[async_trait]
impl Radio for SimulatedRadio {
    async fn scan(&mut self, window: Duration) -> Result<Vec<Advertisement>, DeviceReadError> {
        tokio::time::sleep(window.min(Duration::from_millis(5))).await;

        let mut data = AIRTHINGS_COMPANY_ID.to_le_bytes().to_vec();
        data.extend_from_slice(&self.serial_number.to_le_bytes());
        data.extend_from_slice(&[0x09, 0x00]);

        Ok(vec![
            Advertisement {
                address: MacAddress::new([0x3C, 0x5A, 0xB4, 0x11, 0x22, 0x33]),
                manufacturer_data: None,
            },
            Advertisement {
                address: SIMULATED_AIR_MONITOR,
                manufacturer_data: Some(data),
            },
        ])
    }

    async fn connect(&mut self, address: MacAddress) -> Result<(), DeviceReadError> {
        self.maybe_fail("connect")?;
        self.connected = Some(address);
        Ok(())
    }

    async fn read(
        &mut self,
        address: MacAddress,
        characteristic: Characteristic,
    ) -> Result<Vec<u8>, DeviceReadError> {
        if self.connected != Some(address) {
            return Err(DeviceReadError::NotConnected);
        }
        self.maybe_fail("read")?;

        match (address == SIMULATED_AIR_MONITOR, characteristic) {
            (true, Characteristic::Uuid(uuid)) if uuid == CURRENT_VALUES_UUID => Ok(self.air_frame()),
            (false, Characteristic::Handle(0x03)) => Ok(b"Flower care".to_vec()),
            (false, Characteristic::Handle(0x38)) => {
                let battery = self.rng.gen_range(60..=100);
                let mut out = vec![battery, 0x10];
                out.extend_from_slice(b"3.2.2");
                Ok(out)
            }
            (false, Characteristic::Handle(0x35)) => Ok(self.flora_data()),
            (_, other) => Err(DeviceReadError::MalformedResponse(format!(
                "no characteristic {} on {}",
                other, address
            ))),
        }
    }

    async fn write(&mut self, address: MacAddress, _handle: u16, _value: &[u8]) -> Result<(), DeviceReadError> {
        if self.connected != Some(address) {
            return Err(DeviceReadError::NotConnected);
        }
        Ok(())
    }

    async fn disconnect(&mut self, address: MacAddress) -> Result<(), DeviceReadError> {
        if self.connected == Some(address) {
            self.connected = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::frame;

    #[tokio::test]
    async fn test_air_frame_decodes() {
        let mut radio = SimulatedRadio::new(2930012345, 0.0);
        radio.connect(SIMULATED_AIR_MONITOR).await.unwrap();
        let raw = radio
            .read(SIMULATED_AIR_MONITOR, Characteristic::Uuid(CURRENT_VALUES_UUID))
            .await
            .unwrap();
        assert!(frame::decode_bytes(&raw).is_ok());
    }

    #[tokio::test]
    async fn test_always_failing_radio() {
        let mut radio = SimulatedRadio::new(1, 1.0);
        let addr = MacAddress::new([1, 2, 3, 4, 5, 6]);
        assert!(radio.connect(addr).await.is_err());
    }
}
