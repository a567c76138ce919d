//! Sensor module - backends, radio transports, registry and polling

mod address;
mod traits;
mod flora;
mod waveplus;
mod gatttool;
mod simulator;
mod host;
pub mod frame;
pub mod radio;
pub mod registry;
pub mod orchestrator;

pub use address::MacAddress;
pub use traits::{
    BackendInfo, DeviceKind, Parameter, SensorBackend, SensorReading, SensorStatus, Value,
};
pub use radio::{Advertisement, Characteristic, Radio, SharedRadio};
pub use flora::{FloraBackend, FloraData};
pub use waveplus::WavePlusBackend;
pub use gatttool::GatttoolRadio;
pub use simulator::{SimulatedRadio, SIMULATED_AIR_MONITOR};
pub use host::{format_host_temperature, HostSensor, SysinfoThermal};
pub use registry::{
    DeviceIdentity, DeviceRegistry, DeviceStats, FirmwareVersion, RegisteredDevice, SensorEntry,
};
pub use orchestrator::{CycleResult, DeviceReport, PollState, PollingOrchestrator, StatsPolicy};
