//! Streaming module - publish transport, topics and payloads

mod mqtt;

pub use mqtt::*;

use std::path::PathBuf;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PublishError;
use crate::sensors::{format_host_temperature, CycleResult};

/// `[MQTT]` configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub hostname: String,
    pub port: u16,
    pub keepalive: u64,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    pub tls_ca_cert: Option<PathBuf>,
    pub tls_certfile: Option<PathBuf>,
    pub tls_keyfile: Option<PathBuf>,
    pub miflora_base_topic: String,
    pub sensor_base_topic: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 1883,
            keepalive: 60,
            client_id: "bt-tracker".to_string(),
            username: None,
            password: None,
            tls: false,
            tls_ca_cert: None,
            tls_certfile: None,
            tls_keyfile: None,
            miflora_base_topic: "miflora".to_string(),
            sensor_base_topic: "sensor".to_string(),
        }
    }
}

/// Topic layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    miflora_base: String,
    sensor_base: String,
}

impl Topics {
    pub fn new(miflora_base: &str, sensor_base: &str) -> Self {
        Self {
            miflora_base: miflora_base.to_string(),
            sensor_base: sensor_base.to_string(),
        }
    }

    pub fn from_config(config: &MqttConfig) -> Self {
        Self::new(&config.miflora_base_topic, &config.sensor_base_topic)
    }

    pub fn host_temperature(&self) -> String {
        format!("{}/raspberrypi_temp", self.sensor_base)
    }

    pub fn air_monitor(&self) -> String {
        format!("{}/airthings", self.sensor_base)
    }

    pub fn device(&self, name: &str) -> String {
        format!("{}/{}", self.miflora_base, name)
    }

    /// Retained last-will topic
    pub fn announce(&self) -> String {
        format!("{}/$announce", self.miflora_base)
    }
}

/// A serialized message ready for the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Serialize a cycle into messages, in publish order
pub fn cycle_messages(cycle: &CycleResult, topics: &Topics) -> Result<Vec<Message>, PublishError> {
    let mut messages = Vec::with_capacity(cycle.devices.len() + 2);

    if let Some(t) = cycle.host_temperature {
        messages.push(Message {
            topic: topics.host_temperature(),
            payload: serde_json::to_vec(&format_host_temperature(t))?,
        });
    }
    if let Some(reading) = &cycle.air_monitor {
        messages.push(Message {
            topic: topics.air_monitor(),
            payload: reading.to_json()?,
        });
    }
    for device in &cycle.devices {
        messages.push(Message {
            topic: topics.device(&device.name),
            payload: device.reading.to_json()?,
        });
    }

    Ok(messages)
}

/// Publish transport. Delivery guarantees and connection lifecycle live here,
/// not in the polling code.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;

    /// Cleanly close the transport
    async fn close(&self) -> Result<(), PublishError>;
}
