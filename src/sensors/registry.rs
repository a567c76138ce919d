// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/bt-tracker-rs

//! Device registry - configured soil probes, their identity and rolling stats

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{MacAddress, SensorBackend};
use crate::error::{ConfigError, DeviceReadError, FirmwareParseError};

/// Oldest firmware known to report correct values
pub const MIN_SUPPORTED_FIRMWARE: u64 = 319;

/// Dotted numeric firmware version such as `3.2.2`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// The components written one after the other, `3.1.9` -> 319
    pub fn concatenated(&self) -> u64 {
        format!("{}{}{}", self.major, self.minor, self.patch)
            .parse()
            .unwrap_or(u64::MAX)
    }

    pub fn is_supported(&self) -> bool {
        self.concatenated() >= MIN_SUPPORTED_FIRMWARE
    }
}

impl FromStr for FirmwareVersion {
    type Err = FirmwareParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || FirmwareParseError(s.to_string());
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(err());
        }
        let num = |p: &str| {
            if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            p.parse::<u32>().map_err(|_| err())
        };
        Ok(Self::new(num(parts[0])?, num(parts[1])?, num(parts[2])?))
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Turn a display name into an ASCII, hyphen-delimited topic segment
pub fn sanitize_name(name: &str) -> String {
    let mut clean = name.trim().replace(' ', "-");
    for (from, to) in [
        ("ä", "ae"),
        ("Ä", "Ae"),
        ("ö", "oe"),
        ("Ö", "Oe"),
        ("ü", "ue"),
        ("Ü", "Ue"),
        ("ß", "ss"),
    ] {
        clean = clean.replace(from, to);
    }
    // transliteration can reintroduce spaces ("北京" -> "Bei Jing")
    deunicode::deunicode(&clean)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// One `displayName[@location] = MAC` line of the `[Sensors]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorEntry {
    pub name: String,
    pub address: String,
}

impl SensorEntry {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
        }
    }
}

/// Immutable identity of a configured device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    pub address: MacAddress,
    pub display_name: String,
    pub location: String,
    /// Unique within a run, used as the publish topic leaf
    pub name: String,
    pub location_name: String,
}

impl DeviceIdentity {
    pub fn from_entry(entry: &SensorEntry) -> Result<Self, ConfigError> {
        let address: MacAddress = entry.address.parse().map_err(|_| ConfigError::InvalidAddressFormat {
            name: entry.name.clone(),
            address: entry.address.clone(),
        })?;

        let (display_name, location) = match entry.name.split_once('@') {
            Some((name, location)) => (name, location),
            None => (entry.name.as_str(), ""),
        };

        let name = sanitize_name(display_name);
        if name.is_empty() {
            return Err(ConfigError::EmptyDeviceName(entry.name.clone()));
        }

        Ok(Self {
            address,
            display_name: display_name.to_string(),
            location: location.to_string(),
            name,
            location_name: sanitize_name(location),
        })
    }
}

/// Per-device counters, kept for the lifetime of the process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

/// A configured device with its backend
pub struct RegisteredDevice {
    pub identity: DeviceIdentity,
    pub refresh: Duration,
    pub stats: DeviceStats,
    pub firmware: Option<FirmwareVersion>,
    pub backend: Box<dyn SensorBackend>,
}

/// Owns every configured device for the lifetime of the daemon
pub struct DeviceRegistry {
    devices: Vec<RegisteredDevice>,
}

impl DeviceRegistry {
    /// Validate the configured entries and attach a backend to each.
    ///
    /// Fails fast on a malformed address or on two entries that sanitize to
    /// the same internal name.
    pub fn build<F>(entries: &[SensorEntry], refresh: Duration, mut backend: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&DeviceIdentity) -> Box<dyn SensorBackend>,
    {
        if entries.is_empty() {
            return Err(ConfigError::NoSensors);
        }

        let mut seen: HashMap<String, String> = HashMap::new();
        let mut devices = Vec::with_capacity(entries.len());

        for entry in entries {
            let identity = DeviceIdentity::from_entry(entry)?;
            if let Some(first) = seen.insert(identity.name.clone(), entry.name.clone()) {
                return Err(ConfigError::DuplicateDeviceName {
                    first,
                    second: entry.name.clone(),
                    sanitized: identity.name,
                });
            }

            devices.push(RegisteredDevice {
                backend: backend(&identity),
                identity,
                refresh,
                stats: DeviceStats::default(),
                firmware: None,
            });
        }

        Ok(Self { devices })
    }

    /// One exploratory connect+read per device. Failures are logged and the
    /// device stays registered; startup never aborts here.
    pub async fn probe(&mut self) {
        for device in &mut self.devices {
            let id = &device.identity;
            info!("Adding sensor \"{}\" ({}) and testing connection", id.display_name, id.address);

            match probe_device(device.backend.as_mut()).await {
                Ok(firmware) => {
                    info!(
                        "Initial connection to sensor \"{}\" ({}) successful, internal name \"{}\", firmware {}",
                        id.display_name,
                        id.address,
                        id.name,
                        firmware.as_deref().unwrap_or("unknown")
                    );
                    device.firmware = check_firmware(&id.display_name, firmware.as_deref());
                }
                Err(e) => {
                    warn!(
                        "Initial connection to sensor \"{}\" ({}) failed: {}",
                        id.display_name, id.address, e
                    );
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredDevice> {
        self.devices.iter().find(|d| d.identity.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredDevice> {
        self.devices.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RegisteredDevice> {
        self.devices.iter_mut()
    }

    /// (internal name, stats) in configuration order
    pub fn stats(&self) -> Vec<(String, DeviceStats)> {
        self.devices
            .iter()
            .map(|d| (d.identity.name.clone(), d.stats))
            .collect()
    }
}

async fn probe_device(backend: &mut dyn SensorBackend) -> Result<Option<String>, DeviceReadError> {
    backend.connect().await?;
    let result = async {
        backend.read().await?;
        backend.identify().await
    }
    .await;
    if let Err(e) = backend.disconnect().await {
        warn!("Disconnect after probe failed: {}", e);
    }
    Ok(result?.firmware)
}

fn check_firmware(display_name: &str, firmware: Option<&str>) -> Option<FirmwareVersion> {
    let raw = firmware?;
    match raw.parse::<FirmwareVersion>() {
        Ok(version) => {
            if !version.is_supported() {
                warn!(
                    "Sensor \"{}\" runs firmware {}; versions before 3.1.9 are not supported, please update",
                    display_name, version
                );
            }
            Some(version)
        }
        Err(e) => {
            warn!("Sensor \"{}\": {}", display_name, e);
            None
        }
    }
}
