//! DTN IoTSC daemon library
//!
//! Command line, configuration, logging, the loopback status endpoint and the
//! [`Daemon`] tying a BLE peripheral to them.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod device_id;
pub mod error;
pub mod logging;
pub mod rpc;
pub mod status;

pub use cli::{Cli, Commands};
pub use config::DaemonConfig;
pub use daemon::Daemon;
pub use error::{DaemonError, Result};
pub use status::{query_status, StatusServer};
