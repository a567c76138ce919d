// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/bt-tracker-rs

//! Host (SoC) temperature

use sysinfo::Components;
use tracing::debug;

use crate::error::HostSensorError;

/// Local system temperature source, read once per cycle
pub trait HostSensor: Send {
    fn read_celsius(&mut self) -> Result<f64, HostSensorError>;
}

/// Reads the CPU/SoC thermal zone through `sysinfo`
pub struct SysinfoThermal {
    components: Components,
}

impl SysinfoThermal {
    pub fn new() -> Self {
        Self {
            components: Components::new_with_refreshed_list(),
        }
    }
}

impl Default for SysinfoThermal {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSensor for SysinfoThermal {
    fn read_celsius(&mut self) -> Result<f64, HostSensorError> {
        self.components.refresh_list();

        let list = self.components.list();
        let component = list
            .iter()
            .find(|c| {
                let label = c.label().to_lowercase();
                label.contains("cpu") || label.contains("soc")
            })
            .or_else(|| list.first())
            .ok_or(HostSensorError::Unavailable)?;

        let temperature = component.temperature();
        debug!("host thermal sensor \"{}\" reads {}", component.label(), temperature);
        if !temperature.is_finite() {
            return Err(HostSensorError::InvalidValue(component.label().to_string()));
        }
        Ok(temperature as f64)
    }
}

/// Host temperature payload: a JSON string with one decimal, e.g. `"47.2"`
pub fn format_host_temperature(celsius: f64) -> String {
    format!("{:.1}", celsius)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_host_temperature() {
        assert_eq!(format_host_temperature(47.24), "47.2");
        assert_eq!(format_host_temperature(50.0), "50.0");
        assert_eq!(format_host_temperature(-3.06), "-3.1");
    }
}
