//! Error types for the BlueZ platform stack

use iotsc_core::{AdvertisingCommand, PeripheralError};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors specific to the platform Bluetooth stack
#[derive(Error, Debug)]
pub enum BleError {
    #[error("Failed to open Bluetooth session: {0}")]
    Session(String),

    #[error("Bluetooth adapter {name} not available: {reason}")]
    AdapterNotAvailable { name: String, reason: String },

    #[error("Failed to power on adapter {name}: {reason}")]
    PowerOn { name: String, reason: String },

    #[error("Failed to set adapter alias: {0}")]
    Alias(String),

    #[error("Failed to register GATT application: {0}")]
    GattRegistration(String),

    #[error("Failed to {command}: {reason}")]
    Advertising {
        command: AdvertisingCommand,
        reason: String,
    },

    #[error("Failed to get adapter events: {0}")]
    EventStreamFailed(String),

    #[error("BLE peripheral mode is not supported on this platform")]
    Unsupported,
}

impl From<BleError> for PeripheralError {
    fn from(err: BleError) -> Self {
        match err {
            BleError::Advertising { command, reason } => {
                PeripheralError::Advertising { command, reason }
            }
            BleError::GattRegistration(_) | BleError::Alias(_) | BleError::EventStreamFailed(_) => {
                PeripheralError::Registration {
                    reason: err.to_string(),
                }
            }
            BleError::Session(_)
            | BleError::AdapterNotAvailable { .. }
            | BleError::PowerOn { .. }
            | BleError::Unsupported => PeripheralError::PlatformUnavailable {
                reason: err.to_string(),
            },
        }
    }
}
