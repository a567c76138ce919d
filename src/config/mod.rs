// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/bt-tracker-rs

//! Configuration module

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::ConfigError;
use crate::sensors::{MacAddress, SensorEntry, StatsPolicy};
use crate::streaming::MqttConfig;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Radio adapter and backend selection
    #[serde(rename = "General")]
    pub general: GeneralConfig,

    /// Polling loop
    #[serde(rename = "Daemon")]
    pub daemon: DaemonConfig,

    /// Broker connection and base topics
    #[serde(rename = "MQTT")]
    pub mqtt: MqttConfig,

    /// `displayName[@location] = "MAC"`, in declaration order
    #[serde(rename = "Sensors")]
    pub sensors: toml::Table,

    /// Indoor air monitor
    #[serde(rename = "Airthings")]
    pub airthings: AirthingsConfig,
}

impl Config {
    /// Load, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&content)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse TOML text without touching the environment
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        config.mqtt.miflora_base_topic = config.mqtt.miflora_base_topic.to_lowercase();
        config.mqtt.sensor_base_topic = config.mqtt.sensor_base_topic.to_lowercase();
        Ok(config)
    }

    /// `MQTT_HOSTNAME`, `MQTT_PORT`, `MQTT_USERNAME` and `MQTT_PASSWORD`
    /// take precedence over the file
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MQTT_HOSTNAME") {
            self.mqtt.hostname = host;
        }
        if let Some(port) = lookup("MQTT_PORT") {
            self.mqtt.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "MQTT_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(user) = lookup("MQTT_USERNAME") {
            self.mqtt.username = Some(user);
        }
        if let Some(pass) = lookup("MQTT_PASSWORD") {
            self.mqtt.password = Some(pass);
        }
        Ok(())
    }

    /// Setup-time checks; any failure here aborts startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensors.is_empty() {
            return Err(ConfigError::NoSensors);
        }
        if self.airthings.serial_number.is_none() {
            return Err(ConfigError::MissingSerialNumber);
        }
        if self.daemon.period == 0 {
            return Err(ConfigError::InvalidValue {
                key: "Daemon.period",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// The `[Sensors]` section as ordered entries
    pub fn sensor_entries(&self) -> Result<Vec<SensorEntry>, ConfigError> {
        self.sensors
            .iter()
            .map(|(name, value)| match value.as_str() {
                Some(address) => Ok(SensorEntry::new(name, address)),
                None => Err(ConfigError::InvalidAddressFormat {
                    name: name.clone(),
                    address: value.to_string(),
                }),
            })
            .collect()
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("bt-tracker"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Which radio driver the backends talk through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioBackend {
    #[default]
    Gatttool,
    Simulated,
}

/// `[General]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Bluetooth adapter, e.g. `hci0`
    pub adapter: String,

    pub backend: RadioBackend,

    /// Seconds before a single transport command is abandoned
    pub timeout: u64,

    /// Backend-level retries per transport command
    pub retries: u32,

    /// Fraction of simulated radio operations that fail
    pub simulated_failure_rate: f64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            adapter: "hci0".to_string(),
            backend: RadioBackend::Gatttool,
            timeout: 10,
            retries: 3,
            simulated_failure_rate: 0.1,
        }
    }
}

impl GeneralConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// `[Daemon]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Repeat forever; false runs exactly one cycle
    pub enabled: bool,

    /// Seconds between cycles
    pub period: u64,

    /// Pause between individual publishes
    pub publish_pause_ms: u64,

    /// Count exhausted cycles as both failure and success
    pub legacy_stats: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period: 300,
            publish_pause_ms: 500,
            legacy_stats: false,
        }
    }
}

impl DaemonConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period)
    }

    pub fn publish_pause(&self) -> Duration {
        Duration::from_millis(self.publish_pause_ms)
    }

    pub fn stats_policy(&self) -> StatsPolicy {
        if self.legacy_stats {
            StatsPolicy::Legacy
        } else {
            StatsPolicy::FailuresOnly
        }
    }
}

/// `[Airthings]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AirthingsConfig {
    pub serial_number: Option<u32>,

    /// Known address; skips advertisement discovery
    pub address: Option<MacAddress>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[General]
adapter = "hci1"

[Daemon]
enabled = false
period = 600

[MQTT]
hostname = "broker.lan"
miflora_base_topic = "MiFlora"

[Sensors]
"Zitronenbaum@Wintergarten" = "C4:7C:8D:6A:3E:12"
Basil = "c4:7c:8d:6a:3e:13"
"Aloe Vera" = "C4:7C:8D:6A:3E:14"

[Airthings]
serial_number = 2930012345
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::parse(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.general.adapter, "hci1");
        assert_eq!(config.general.backend, RadioBackend::Gatttool);
        assert!(!config.daemon.enabled);
        assert_eq!(config.daemon.period(), Duration::from_secs(600));
        assert_eq!(config.daemon.publish_pause(), Duration::from_millis(500));
        assert_eq!(config.mqtt.hostname, "broker.lan");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.miflora_base_topic, "miflora");
        assert_eq!(config.mqtt.sensor_base_topic, "sensor");
        assert_eq!(config.airthings.serial_number, Some(2930012345));
    }

    #[test]
    fn test_sensor_entries_keep_order() {
        let config = Config::parse(SAMPLE).unwrap();
        let entries = config.sensor_entries().unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Zitronenbaum@Wintergarten", "Basil", "Aloe Vera"]);
        assert_eq!(entries[1].address, "c4:7c:8d:6a:3e:13");
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.general.adapter, "hci0");
        assert!(config.daemon.enabled);
        assert_eq!(config.daemon.period, 300);
        assert_eq!(config.daemon.stats_policy(), StatsPolicy::FailuresOnly);
        assert_eq!(config.mqtt.miflora_base_topic, "miflora");
        assert!(matches!(config.validate(), Err(ConfigError::NoSensors)));
    }

    #[test]
    fn test_missing_serial_number() {
        let config = Config::parse("[Sensors]\nBasil = \"C4:7C:8D:6A:3E:12\"\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::MissingSerialNumber)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config
            .apply_env(|key| match key {
                "MQTT_HOSTNAME" => Some("10.0.0.2".to_string()),
                "MQTT_PORT" => Some("8883".to_string()),
                "MQTT_USERNAME" => Some("tracker".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.mqtt.hostname, "10.0.0.2");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.mqtt.username.as_deref(), Some("tracker"));
        assert_eq!(config.mqtt.password, None);

        let bad = config.apply_env(|key| (key == "MQTT_PORT").then(|| "eighty".to_string()));
        assert!(matches!(bad, Err(ConfigError::InvalidValue { key: "MQTT_PORT", .. })));
    }

    #[test]
    fn test_tls_without_ca_uses_system_store() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.mqtt.tls = true;
        assert!(config.validate().is_ok());
        assert_eq!(config.mqtt.tls_ca_cert, None);
    }

    #[test]
    fn test_non_string_sensor_address() {
        let config = Config::parse("[Sensors]\nBasil = 42\n").unwrap();
        assert!(matches!(config.sensor_entries(), Err(ConfigError::InvalidAddressFormat { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/bt-tracker/config.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.sensor_entries().unwrap().len(), 3);
    }
}
