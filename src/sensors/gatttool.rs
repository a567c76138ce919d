// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/bt-tracker-rs

//! BlueZ `gatttool` radio
//!
//! Every GATT operation is a separate `gatttool` invocation, so connect and
//! disconnect only track which peripheral is currently selected.

use std::time::Duration;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{Advertisement, Characteristic, MacAddress, Radio};
use crate::error::DeviceReadError;

const READ_PREFIX: &str = "Characteristic value/descriptor:";
const WRITE_OK: &str = "Characteristic value was written successfully";

/// Radio driven through the `gatttool` command line tool
pub struct GatttoolRadio {
    adapter: String,
    timeout: Duration,
    retries: u32,
    selected: Option<MacAddress>,
}

impl GatttoolRadio {
    pub fn new(adapter: &str, timeout: Duration, retries: u32) -> Self {
        Self {
            adapter: adapter.to_string(),
            timeout,
            retries: retries.max(1),
            selected: None,
        }
    }

    fn ensure_selected(&self, address: MacAddress) -> Result<(), DeviceReadError> {
        match self.selected {
            Some(a) if a == address => Ok(()),
            _ => Err(DeviceReadError::NotConnected),
        }
    }

    /// Run one gatttool command with the backend-level retry policy
    async fn run(&self, address: MacAddress, args: &[String]) -> Result<String, DeviceReadError> {
        let mut last_error = DeviceReadError::Transport("gatttool was not run".to_string());

        for attempt in 1..=self.retries {
            match self.run_once(address, args).await {
                Ok(output) => return Ok(output),
                Err(e) => {
                    debug!("gatttool attempt {}/{} for {} failed: {}", attempt, self.retries, address, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn run_once(&self, address: MacAddress, args: &[String]) -> Result<String, DeviceReadError> {
        let mut cmd = Command::new("gatttool");
        cmd.arg(format!("--device={}", address))
            .arg(format!("--adapter={}", self.adapter))
            .args(args)
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| DeviceReadError::Timeout(self.timeout))??;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);

        if let Some(reason) = transport_failure(&stdout).or_else(|| transport_failure(&stderr)) {
            return Err(DeviceReadError::BrokenConnection(format!("{}: {}", address, reason)));
        }
        if !output.status.success() {
            return Err(DeviceReadError::Transport(format!(
                "gatttool exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(stdout)
    }
}

#[async_trait]
impl Radio for GatttoolRadio {
    async fn scan(&mut self, _window: Duration) -> Result<Vec<Advertisement>, DeviceReadError> {
        warn!("gatttool cannot scan for advertisements; configure the device address instead");
        Err(DeviceReadError::Transport(
            "advertisement scanning is not supported by the gatttool backend".to_string(),
        ))
    }

    async fn connect(&mut self, address: MacAddress) -> Result<(), DeviceReadError> {
        self.selected = Some(address);
        Ok(())
    }

    async fn read(
        &mut self,
        address: MacAddress,
        characteristic: Characteristic,
    ) -> Result<Vec<u8>, DeviceReadError> {
        self.ensure_selected(address)?;

        match characteristic {
            Characteristic::Handle(handle) => {
                let args = ["--char-read".to_string(), format!("--handle=0x{:04x}", handle)];
                let output = self.run(address, &args).await?;
                parse_handle_read(&output)
            }
            Characteristic::Uuid(uuid) => {
                let args = ["--char-read".to_string(), format!("--uuid={}", uuid)];
                let output = self.run(address, &args).await?;
                parse_uuid_read(&output)
            }
        }
    }

    async fn write(&mut self, address: MacAddress, handle: u16, value: &[u8]) -> Result<(), DeviceReadError> {
        self.ensure_selected(address)?;

        let hex: String = value.iter().map(|b| format!("{:02x}", b)).collect();
        let args = [
            "--char-write-req".to_string(),
            format!("--handle=0x{:04x}", handle),
            format!("--value={}", hex),
        ];
        let output = self.run(address, &args).await?;
        if output.contains(WRITE_OK) {
            Ok(())
        } else {
            Err(DeviceReadError::MalformedResponse(output.trim().to_string()))
        }
    }

    async fn disconnect(&mut self, address: MacAddress) -> Result<(), DeviceReadError> {
        if self.selected == Some(address) {
            self.selected = None;
        }
        Ok(())
    }
}

fn transport_failure(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|line| {
        line.contains("connect error")
            || line.contains("Device or resource busy")
            || line.contains("Connection refused")
            || line.contains("Function not implemented")
    })
}

/// Parse space separated hex bytes such as `64 10 33 2e 32`
pub fn parse_hex_bytes(text: &str) -> Result<Vec<u8>, DeviceReadError> {
    text.split_whitespace()
        .map(|pair| {
            u8::from_str_radix(pair, 16)
                .map_err(|_| DeviceReadError::MalformedResponse(format!("bad hex byte \"{}\"", pair)))
        })
        .collect()
}

/// Parse the output of `--char-read --handle=...`
pub fn parse_handle_read(output: &str) -> Result<Vec<u8>, DeviceReadError> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix(READ_PREFIX))
        .ok_or_else(|| DeviceReadError::MalformedResponse(output.trim().to_string()))
        .and_then(parse_hex_bytes)
}

/// Parse the output of `--char-read --uuid=...`, e.g.
/// `handle: 0x000d 	 value: 01 8c 00 00`
pub fn parse_uuid_read(output: &str) -> Result<Vec<u8>, DeviceReadError> {
    output
        .lines()
        .find_map(|line| line.split_once("value:").map(|(_, rest)| rest))
        .ok_or_else(|| DeviceReadError::MalformedResponse(output.trim().to_string()))
        .and_then(parse_hex_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_handle_read() {
        let out = "Characteristic value/descriptor: 64 10 33 2e 32 2e 32 \n";
        assert_eq!(
            parse_handle_read(out).unwrap(),
            vec![0x64, 0x10, 0x33, 0x2e, 0x32, 0x2e, 0x32]
        );
    }

    #[test]
    fn test_parse_uuid_read() {
        let out = "handle: 0x000d \t value: 01 8c 00 00 30 00 \n";
        assert_eq!(parse_uuid_read(out).unwrap(), vec![0x01, 0x8c, 0x00, 0x00, 0x30, 0x00]);
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        assert!(matches!(
            parse_handle_read("Read characteristics failed: Internal application error"),
            Err(DeviceReadError::MalformedResponse(_))
        ));
        assert!(matches!(parse_hex_bytes("64 zz"), Err(DeviceReadError::MalformedResponse(_))));
    }

    #[test]
    fn test_transport_failure_detection() {
        assert!(transport_failure("connect error: Connection refused (111)").is_some());
        assert!(transport_failure("Characteristic value/descriptor: 00").is_none());
    }

    #[tokio::test]
    async fn test_read_requires_connect() {
        let mut radio = GatttoolRadio::new("hci0", Duration::from_secs(1), 1);
        let addr: MacAddress = "C4:7C:8D:6A:3E:12".parse().unwrap();
        let result = radio.read(addr, Characteristic::Handle(0x38)).await;
        assert!(matches!(result, Err(DeviceReadError::NotConnected)));
    }
}
