// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/bt-tracker-rs

//! Radio transport seam - the raw GATT driver underneath every backend

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::MacAddress;
use crate::error::DeviceReadError;

/// GATT characteristic selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Characteristic {
    Handle(u16),
    Uuid(&'static str),
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Characteristic::Handle(h) => write!(f, "0x{:04x}", h),
            Characteristic::Uuid(u) => f.write_str(u),
        }
    }
}

/// One received advertisement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub address: MacAddress,
    /// Raw manufacturer specific data, company id included
    pub manufacturer_data: Option<Vec<u8>>,
}

/// Low-level wireless driver. Only one peripheral can be talked to at a time.
#[async_trait]
pub trait Radio: Send {
    /// Listen for advertisements for `window`
    async fn scan(&mut self, window: Duration) -> Result<Vec<Advertisement>, DeviceReadError>;

    async fn connect(&mut self, address: MacAddress) -> Result<(), DeviceReadError>;

    async fn read(
        &mut self,
        address: MacAddress,
        characteristic: Characteristic,
    ) -> Result<Vec<u8>, DeviceReadError>;

    async fn write(
        &mut self,
        address: MacAddress,
        handle: u16,
        value: &[u8],
    ) -> Result<(), DeviceReadError>;

    async fn disconnect(&mut self, address: MacAddress) -> Result<(), DeviceReadError>;
}

/// The physical adapter, shared by every backend and used one caller at a time
pub type SharedRadio = Arc<Mutex<Box<dyn Radio>>>;

/// Wrap a driver for sharing between backends
pub fn shared(radio: impl Radio + 'static) -> SharedRadio {
    let radio: Box<dyn Radio> = Box::new(radio);
    Arc::new(Mutex::new(radio))
}
