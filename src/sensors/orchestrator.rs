// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/bt-tracker-rs

//! Polling orchestrator - one full pass over every sensor
//!
//! Each configured device runs a small bounded-retry state machine:
//!
//! ```text
//! Idle ──▶ Attempting{remaining} ──ok──▶ Success
//!              │   ▲
//!              │   └─ err, remaining > 0
//!              └─ err, remaining == 0 ──▶ Exhausted
//! ```
//!
//! Device failures never leave this module: they become log lines, stats and
//! "unavailable" markers in the emitted reading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::registry::{DeviceRegistry, RegisteredDevice};
use super::{HostSensor, SensorBackend, SensorReading};
use crate::error::DeviceReadError;

/// Additional attempts after the first one, per device per cycle
pub const RETRY_BUDGET: u32 = 2;

/// Per device, per cycle polling state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Attempting { remaining: u32 },
    Success,
    Exhausted,
}

/// How an exhausted cycle is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatsPolicy {
    /// Exhausted counts as a failure only
    #[default]
    FailuresOnly,
    /// Exhausted counts as a failure and a success, as older deployments did
    Legacy,
}

/// Outcome of polling one configured device
#[derive(Debug, Clone)]
pub struct DeviceReport {
    /// Sanitized internal name, the topic leaf
    pub name: String,
    pub display_name: String,
    pub state: PollState,
    pub attempts: u32,
    pub reading: SensorReading,
}

/// Everything gathered in one cycle, in publish order
#[derive(Debug, Clone)]
pub struct CycleResult {
    pub started_at: DateTime<Utc>,
    pub host_temperature: Option<f64>,
    pub air_monitor: Option<SensorReading>,
    pub devices: Vec<DeviceReport>,
}

/// Drives the per-device retry state machine
#[derive(Debug, Clone)]
pub struct PollingOrchestrator {
    retry_budget: u32,
    stats_policy: StatsPolicy,
}

impl Default for PollingOrchestrator {
    fn default() -> Self {
        Self::new(StatsPolicy::default())
    }
}

impl PollingOrchestrator {
    pub fn new(stats_policy: StatsPolicy) -> Self {
        Self {
            retry_budget: RETRY_BUDGET,
            stats_policy,
        }
    }

    /// Host temperature, then the air monitor, then every configured device
    pub async fn run_cycle(
        &self,
        registry: &mut DeviceRegistry,
        air_monitor: &mut dyn SensorBackend,
        host: &mut dyn HostSensor,
    ) -> CycleResult {
        let started_at = Utc::now();

        let host_temperature = self.read_host_temperature(host);
        let air_monitor = self.poll_air_monitor(air_monitor).await;

        let mut devices = Vec::with_capacity(registry.len());
        for device in registry.iter_mut() {
            devices.push(self.poll_device(device).await);
        }

        CycleResult {
            started_at,
            host_temperature,
            air_monitor,
            devices,
        }
    }

    pub fn read_host_temperature(&self, host: &mut dyn HostSensor) -> Option<f64> {
        info!("Retrieving host temperature ...");
        match host.read_celsius() {
            Ok(t) => {
                info!("Result: {:.1} °C", t);
                Some(t)
            }
            Err(e) => {
                error!("Failed to read host temperature: {}", e);
                None
            }
        }
    }

    /// Single shot: discover if needed, connect, read, disconnect
    pub async fn poll_air_monitor(&self, backend: &mut dyn SensorBackend) -> Option<SensorReading> {
        info!("Retrieving data from air monitor ...");
        backend.invalidate();

        match attempt(backend).await {
            Ok(reading) => {
                info!("Result: {}", describe(&reading));
                Some(reading)
            }
            Err(e) => {
                error!("Failed to read air monitor: {}", e);
                None
            }
        }
    }

    /// Run the retry state machine for one device and update its stats
    pub async fn poll_device(&self, device: &mut RegisteredDevice) -> DeviceReport {
        let backend = device.backend.as_mut();
        let id = &device.identity;

        let mut state = PollState::Idle;
        let mut attempts = 0;
        let mut reading = None;

        device.stats.attempts += 1;
        info!("Retrieving data from sensor \"{}\" ...", id.display_name);

        loop {
            state = match state {
                PollState::Idle => {
                    // stale values must never be republished as fresh
                    backend.invalidate();
                    PollState::Attempting { remaining: self.retry_budget }
                }
                PollState::Attempting { remaining } => {
                    attempts += 1;
                    match attempt(backend).await {
                        Ok(r) => {
                            reading = Some(r);
                            PollState::Success
                        }
                        Err(e) if remaining > 0 => {
                            warn!("Retrying \"{}\" due to: {}", id.display_name, e);
                            backend.invalidate();
                            PollState::Attempting { remaining: remaining - 1 }
                        }
                        Err(e) => {
                            error!(
                                "Giving up on \"{}\" after {} attempts: {}",
                                id.display_name, attempts, e
                            );
                            PollState::Exhausted
                        }
                    }
                }
                PollState::Success | PollState::Exhausted => break,
            };
        }

        match state {
            PollState::Success => device.stats.successes += 1,
            _ => {
                device.stats.failures += 1;
                if self.stats_policy == StatsPolicy::Legacy {
                    device.stats.successes += 1;
                }
            }
        }

        let reading = reading.unwrap_or_else(|| backend.cached_reading());
        info!("Result: {}", describe(&reading));
        debug!(
            "\"{}\" stats: {} attempts, {} successes, {} failures",
            id.name, device.stats.attempts, device.stats.successes, device.stats.failures
        );

        DeviceReport {
            name: id.name.clone(),
            display_name: id.display_name.clone(),
            state,
            attempts,
            reading,
        }
    }
}

/// connect + read, always followed by a disconnect
async fn attempt(backend: &mut dyn SensorBackend) -> Result<SensorReading, DeviceReadError> {
    backend.connect().await?;
    let result = backend.read().await;
    if let Err(e) = backend.disconnect().await {
        debug!("Disconnect failed: {}", e);
    }
    result
}

/// `light 1200 lux, temperature 21.5 °C, battery n/a`
fn describe(reading: &SensorReading) -> String {
    reading
        .iter()
        .map(|(parameter, value)| match value {
            Some(v) => format!("{} {} {}", parameter.key(), v, parameter.unit()),
            None => format!("{} n/a", parameter.key()),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;
    use async_trait::async_trait;

    use super::*;
    use crate::error::HostSensorError;
    use crate::sensors::registry::SensorEntry;
    use crate::sensors::{BackendInfo, DeviceKind, Parameter, SensorStatus, Value};

    /// Soil probe whose read attempts follow a script; `true` succeeds
    struct ScriptedBackend {
        script: VecDeque<bool>,
        battery_on_failure: bool,
        cache: SensorReading,
        status: SensorStatus,
        reads: u32,
    }

    impl ScriptedBackend {
        fn new(script: &[bool]) -> Self {
            Self {
                script: script.iter().copied().collect(),
                battery_on_failure: false,
                cache: SensorReading::unavailable(DeviceKind::SoilProbe),
                status: SensorStatus::Disconnected,
                reads: 0,
            }
        }
    }

    #[async_trait]
    impl SensorBackend for ScriptedBackend {
        fn kind(&self) -> DeviceKind { DeviceKind::SoilProbe }
        fn status(&self) -> SensorStatus { self.status }

        async fn connect(&mut self) -> Result<(), DeviceReadError> {
            self.status = SensorStatus::Connected;
            Ok(())
        }

        async fn read(&mut self) -> Result<SensorReading, DeviceReadError> {
            self.reads += 1;
            if self.script.pop_front().unwrap_or(false) {
                self.cache = SensorReading::unavailable(DeviceKind::SoilProbe)
                    .with(Parameter::Light, 1200i64)
                    .with(Parameter::Temperature, 21.5)
                    .with(Parameter::Moisture, 35i64)
                    .with(Parameter::Conductivity, 410i64)
                    .with(Parameter::Battery, 97i64);
                Ok(self.cache.clone())
            } else {
                if self.battery_on_failure {
                    self.cache.set(Parameter::Battery, Some(Value::Integer(88)));
                }
                Err(DeviceReadError::Transport("scripted failure".to_string()))
            }
        }

        async fn disconnect(&mut self) -> Result<(), DeviceReadError> {
            self.status = SensorStatus::Disconnected;
            Ok(())
        }

        async fn identify(&mut self) -> Result<BackendInfo, DeviceReadError> {
            Ok(BackendInfo { name: "scripted".to_string(), address: None, firmware: None })
        }

        fn invalidate(&mut self) {
            self.cache = SensorReading::unavailable(DeviceKind::SoilProbe);
        }

        fn cached_reading(&self) -> SensorReading {
            self.cache.clone()
        }
    }

    struct FailingHost;

    impl HostSensor for FailingHost {
        fn read_celsius(&mut self) -> Result<f64, HostSensorError> {
            Err(HostSensorError::Unavailable)
        }
    }

    fn registry_with(backend: ScriptedBackend) -> DeviceRegistry {
        let mut backend = Some(backend);
        DeviceRegistry::build(
            &[SensorEntry::new("Basil", "C4:7C:8D:6A:3E:12")],
            Duration::from_secs(300),
            |_| Box::new(backend.take().unwrap()),
        )
        .unwrap()
    }

    async fn poll_once(orchestrator: &PollingOrchestrator, registry: &mut DeviceRegistry) -> DeviceReport {
        let device = registry.iter_mut().next().unwrap();
        orchestrator.poll_device(device).await
    }

    #[tokio::test]
    async fn test_success_on_third_attempt() {
        let orchestrator = PollingOrchestrator::default();
        let mut registry = registry_with(ScriptedBackend::new(&[false, false, true]));

        let report = poll_once(&orchestrator, &mut registry).await;

        assert_eq!(report.state, PollState::Success);
        assert_eq!(report.attempts, 3);
        assert!(report.reading.is_complete());
        assert_eq!(
            registry.get("Basil").unwrap().stats,
            crate::sensors::DeviceStats { attempts: 1, successes: 1, failures: 0 }
        );
    }

    #[tokio::test]
    async fn test_exhausted_after_three_attempts() {
        let orchestrator = PollingOrchestrator::default();
        let mut registry = registry_with(ScriptedBackend::new(&[false, false, false, true]));

        let report = poll_once(&orchestrator, &mut registry).await;

        assert_eq!(report.state, PollState::Exhausted);
        assert_eq!(report.attempts, 3);
        assert!(report.reading.is_empty());
        assert_eq!(report.reading.len(), 5);

        let stats = registry.get("Basil").unwrap().stats;
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.successes, 0);
    }

    #[tokio::test]
    async fn test_legacy_stats_policy() {
        let orchestrator = PollingOrchestrator::new(StatsPolicy::Legacy);
        let mut registry = registry_with(ScriptedBackend::new(&[]));

        poll_once(&orchestrator, &mut registry).await;
        poll_once(&orchestrator, &mut registry).await;

        let stats = registry.get("Basil").unwrap().stats;
        assert_eq!(stats, crate::sensors::DeviceStats { attempts: 2, successes: 2, failures: 2 });
    }

    #[tokio::test]
    async fn test_exhausted_reports_partial_cache() {
        let orchestrator = PollingOrchestrator::default();
        let mut backend = ScriptedBackend::new(&[false, false, false]);
        backend.battery_on_failure = true;
        let mut registry = registry_with(backend);

        let report = poll_once(&orchestrator, &mut registry).await;

        assert_eq!(report.state, PollState::Exhausted);
        assert_eq!(report.reading.get(Parameter::Battery), Some(Value::Integer(88)));
        assert_eq!(report.reading.get(Parameter::Light), None);
    }

    #[tokio::test]
    async fn test_cache_invalidated_each_cycle() {
        let orchestrator = PollingOrchestrator::default();
        let mut registry = registry_with(ScriptedBackend::new(&[true, false, false, false]));

        let first = poll_once(&orchestrator, &mut registry).await;
        assert!(first.reading.is_complete());

        let second = poll_once(&orchestrator, &mut registry).await;
        assert_eq!(second.state, PollState::Exhausted);
        assert!(second.reading.is_empty());
    }

    #[test]
    fn test_describe_shows_units() {
        let reading = SensorReading::unavailable(DeviceKind::SoilProbe)
            .with(Parameter::Light, 1200i64)
            .with(Parameter::Temperature, 21.5);
        assert_eq!(
            describe(&reading),
            "light 1200 lux, temperature 21.5 °C, moisture n/a, conductivity n/a, battery n/a"
        );
    }

    #[tokio::test]
    async fn test_cycle_survives_failures() {
        let orchestrator = PollingOrchestrator::default();
        let mut registry = registry_with(ScriptedBackend::new(&[true]));
        let mut air = ScriptedBackend::new(&[false]);

        let result = orchestrator.run_cycle(&mut registry, &mut air, &mut FailingHost).await;

        assert_eq!(result.host_temperature, None);
        assert!(result.air_monitor.is_none());
        assert_eq!(air.reads, 1);
        assert_eq!(result.devices.len(), 1);
        assert_eq!(result.devices[0].state, PollState::Success);
    }
}
