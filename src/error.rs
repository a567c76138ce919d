// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/bt-tracker-rs

//! Error taxonomy
//!
//! Only [`ConfigError`], [`TransportConnectError`] and [`PublishError`] are
//! allowed to end the process. Device and host sensor errors are absorbed by
//! the polling orchestrator and turned into log lines and stats.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems, detected before any polling starts
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("the MAC address \"{address}\" of sensor \"{name}\" is in the wrong format")]
    InvalidAddressFormat { name: String, address: String },

    #[error("sensors \"{first}\" and \"{second}\" both map to the internal name \"{sanitized}\"")]
    DuplicateDeviceName {
        first: String,
        second: String,
        sanitized: String,
    },

    #[error("sensor \"{0}\" has an empty name")]
    EmptyDeviceName(String),

    #[error("no sensors found in configuration")]
    NoSensors,

    #[error("the air monitor serial number is missing from the [Airthings] section")]
    MissingSerialNumber,

    #[error("MQTT TLS is enabled but no tls_ca_cert is configured and no system CA bundle was found")]
    MissingTlsCaCert,

    #[error("failed to read TLS material {path:?}: {source}")]
    TlsMaterial {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Frame decoding failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unsupported protocol version {0}")]
    UnsupportedProtocolVersion(u8),

    #[error("frame is {actual} bytes, expected {expected}")]
    FrameLength { expected: usize, actual: usize },
}

/// Recoverable per-device read failures
#[derive(Debug, Error)]
pub enum DeviceReadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("connection to {0} broken")]
    BrokenConnection(String),

    #[error("device is not connected")]
    NotConnected,

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("transport command timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Host temperature could not be read this cycle
#[derive(Debug, Error)]
pub enum HostSensorError {
    #[error("no thermal sensor available on this host")]
    Unavailable,

    #[error("thermal sensor \"{0}\" returned an invalid value")]
    InvalidValue(String),
}

/// Broker connection could not be established
#[derive(Debug, Error)]
pub enum TransportConnectError {
    #[error("MQTT connection refused: {0}")]
    Refused(String),

    #[error("MQTT connection error: {0}")]
    Connection(String),

    #[error("timed out connecting to MQTT broker {host}:{port}")]
    Timeout { host: String, port: u16 },
}

/// Publishing failed, the bus connection is unusable
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("MQTT publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("MQTT connection lost")]
    ConnectionLost,

    #[error("MQTT disconnect failed: {0}")]
    Disconnect(String),

    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Firmware string is not a dotted numeric version
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid firmware version \"{0}\"")]
pub struct FirmwareParseError(pub String);

/// Hardware address is not six colon-separated hex octets
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hardware address \"{0}\"")]
pub struct AddressParseError(pub String);
