//! Error handling for the IoTSC daemon

use iotsc_core::PeripheralError;
use thiserror::Error;

/// Daemon-specific error types
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("Peripheral error: {0}")]
    Peripheral(#[from] PeripheralError),

    #[error("Status endpoint error: {0}")]
    Status(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl From<iotsc_ble::BleError> for DaemonError {
    fn from(err: iotsc_ble::BleError) -> Self {
        DaemonError::Peripheral(err.into())
    }
}

/// Result type for daemon operations
pub type Result<T> = std::result::Result<T, DaemonError>;
