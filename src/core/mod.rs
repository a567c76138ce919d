//! Core module - daemon context and loop

mod context;
mod daemon;

pub use context::{build_air_monitor, build_radio, build_registry, DaemonContext};
pub use daemon::{run_cycle, DaemonLoop};
