// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/bt-tracker-rs

//! bt-tracker - Bluetooth environmental sensor poller
//!
//! Periodically polls short-range wireless sensors and republishes
//! normalized readings on MQTT:
//! - soil probes (light, temperature, moisture, conductivity, battery)
//! - one indoor air monitor (humidity, radon, temperature, pressure, CO2, VOC)
//! - the host's own SoC temperature
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         DaemonLoop                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌──────────────────┐   ┌───────────────┐   │
//! │  │ HostSensor │ → │ PollingOrchest-  │ → │   Publisher   │   │
//! │  │ AirMonitor │   │ rator (retries,  │   │    (MQTT)     │   │
//! │  │ Registry   │   │ stats, readings) │   │               │   │
//! │  └────────────┘   └──────────────────┘   └───────────────┘   │
//! │        ↓                                                     │
//! │  ┌──────────────────────────────────────────────────────┐    │
//! │  │     SensorBackend → Radio (gatttool / simulated)     │    │
//! │  └──────────────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod core;
pub mod sensors;
pub mod streaming;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use config::Config;
pub use crate::core::{DaemonContext, DaemonLoop};
pub use error::{ConfigError, DecodeError, DeviceReadError, PublishError, TransportConnectError};
pub use sensors::{DeviceRegistry, PollingOrchestrator, SensorBackend, SensorReading};
pub use streaming::{MqttPublisher, Publisher, Topics};

/// bt-tracker version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Project name
pub const NAME: &str = "Bluetooth Tracker MQTT Client/Daemon";
