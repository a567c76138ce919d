// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/bt-tracker-rs

//! Daemon context - everything a cycle needs, built once at startup

use std::time::Duration;
use tracing::info;

use crate::config::{Config, RadioBackend};
use crate::error::ConfigError;
use crate::sensors::{
    radio, DeviceRegistry, FloraBackend, GatttoolRadio, HostSensor, PollingOrchestrator,
    SensorBackend, SharedRadio, SimulatedRadio, WavePlusBackend,
};
use crate::streaming::{Publisher, Topics};

/// Owns the registry, the air monitor, the host sensor and the publisher
/// for the lifetime of the daemon
pub struct DaemonContext {
    pub registry: DeviceRegistry,
    pub air_monitor: Box<dyn SensorBackend>,
    pub host: Box<dyn HostSensor>,
    pub publisher: Box<dyn Publisher>,
    pub topics: Topics,
    pub orchestrator: PollingOrchestrator,
    pub publish_pause: Duration,
}

impl DaemonContext {
    pub fn new(
        registry: DeviceRegistry,
        air_monitor: Box<dyn SensorBackend>,
        host: Box<dyn HostSensor>,
        publisher: Box<dyn Publisher>,
        topics: Topics,
    ) -> Self {
        Self {
            registry,
            air_monitor,
            host,
            publisher,
            topics,
            orchestrator: PollingOrchestrator::default(),
            publish_pause: Duration::from_millis(500),
        }
    }

    pub fn with_orchestrator(mut self, orchestrator: PollingOrchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn with_publish_pause(mut self, pause: Duration) -> Self {
        self.publish_pause = pause;
        self
    }
}

/// The radio adapter selected by `General.backend`
pub fn build_radio(config: &Config) -> SharedRadio {
    let general = &config.general;
    match general.backend {
        RadioBackend::Gatttool => {
            info!("Using gatttool radio on adapter {}", general.adapter);
            radio::shared(GatttoolRadio::new(&general.adapter, general.timeout(), general.retries))
        }
        RadioBackend::Simulated => {
            info!("Using simulated radio (failure rate {})", general.simulated_failure_rate);
            radio::shared(SimulatedRadio::new(
                config.airthings.serial_number.unwrap_or_default(),
                general.simulated_failure_rate,
            ))
        }
    }
}

/// Validated soil probe registry, one backend per `[Sensors]` entry
pub fn build_registry(config: &Config, radio: &SharedRadio) -> Result<DeviceRegistry, ConfigError> {
    let entries = config.sensor_entries()?;
    DeviceRegistry::build(&entries, config.daemon.period(), |identity| {
        Box::new(FloraBackend::new(identity.address, radio.clone()))
    })
}

/// The configured air monitor
pub fn build_air_monitor(config: &Config, radio: &SharedRadio) -> Result<Box<dyn SensorBackend>, ConfigError> {
    let serial = config.airthings.serial_number.ok_or(ConfigError::MissingSerialNumber)?;
    let backend = WavePlusBackend::new(serial, radio.clone());
    Ok(match config.airthings.address {
        Some(address) => Box::new(backend.with_address(address)),
        None => Box::new(backend),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    fn config(text: &str) -> Config {
        Config::parse(text).unwrap()
    }

    #[test]
    fn test_build_registry_from_config() {
        let config = config(
            "[General]\nbackend = \"simulated\"\n[Sensors]\n\"Große Möhre@Beet\" = \"C4:7C:8D:6A:3E:12\"\nBasil = \"C4:7C:8D:6A:3E:13\"\n[Airthings]\nserial_number = 1\n",
        );
        let radio = build_radio(&config);
        let registry = build_registry(&config, &radio).unwrap();

        let names: Vec<String> = registry.iter().map(|d| d.identity.name.clone()).collect();
        assert_eq!(names, ["Grosse-Moehre", "Basil"]);
        assert!(build_air_monitor(&config, &radio).is_ok());
    }

    #[test]
    fn test_duplicate_names_fail_before_polling() {
        let config = config(
            "[Sensors]\n\"Basil Pot\" = \"C4:7C:8D:6A:3E:12\"\n\"Basil-Pot\" = \"C4:7C:8D:6A:3E:13\"\n[Airthings]\nserial_number = 1\n",
        );
        let radio = build_radio(&config);
        assert!(matches!(
            build_registry(&config, &radio),
            Err(ConfigError::DuplicateDeviceName { .. })
        ));
    }

    #[test]
    fn test_air_monitor_requires_serial() {
        let config = config("[Sensors]\nBasil = \"C4:7C:8D:6A:3E:12\"\n");
        let radio = build_radio(&config);
        assert!(matches!(
            build_air_monitor(&config, &radio),
            Err(ConfigError::MissingSerialNumber)
        ));
    }
}
