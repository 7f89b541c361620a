//! Error types for the peripheral core
//!
//! [`GattError`] covers the object model (characteristics and the service),
//! [`PeripheralError`] everything the peripheral and its platform stack can
//! report. Misuse of the object model is a programming error and is never
//! swallowed; a malformed remote payload is answered to the requester and
//! the peripheral keeps running.

use thiserror::Error;
use uuid::Uuid;

use crate::advertising::AdvertisingCommand;
use crate::gatt::Operation;

// ----------------------------------------------------------------------------
// Object Model Errors
// ----------------------------------------------------------------------------

/// Errors raised by characteristics and services
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GattError {
    #[error("{operation} is not permitted on characteristic {uuid}")]
    Capability { uuid: Uuid, operation: Operation },

    #[error("Malformed payload for characteristic {uuid}: {reason}")]
    Decode { uuid: Uuid, reason: String },

    #[error("Offset {offset} is past the end of characteristic {uuid} ({len} bytes)")]
    InvalidOffset { uuid: Uuid, offset: u16, len: usize },

    #[error("Characteristic index {index} already present in service {service}")]
    DuplicateIndex { index: u16, service: Uuid },

    #[error("No characteristic with index {index}")]
    UnknownCharacteristic { index: u16 },
}

impl GattError {
    /// Whether this error reflects a bad remote payload rather than misuse
    /// of the object model
    pub fn is_remote_fault(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::InvalidOffset { .. })
    }
}

// ----------------------------------------------------------------------------
// Peripheral Errors
// ----------------------------------------------------------------------------

/// Errors raised by the peripheral and its platform stack
#[derive(Error, Debug)]
pub enum PeripheralError {
    #[error(transparent)]
    Gatt(#[from] GattError),

    #[error("A service is already registered ({uuid}); only one service is supported")]
    AlreadyRegistered { uuid: Uuid },

    #[error("No service has been added to the peripheral")]
    NotRegistered,

    #[error("Advertisement can no longer be changed once the peripheral is running")]
    AlreadyRunning,

    #[error("Platform rejected {command}: {reason}")]
    Advertising {
        command: AdvertisingCommand,
        reason: String,
    },

    #[error("Bluetooth platform unavailable: {reason}")]
    PlatformUnavailable { reason: String },

    #[error("Failed to register GATT application: {reason}")]
    Registration { reason: String },

    #[error("Platform event source closed")]
    EventSourceClosed,
}

impl PeripheralError {
    /// Whether the error came from a rejected start/stop advertising command
    pub fn is_advertising(&self) -> bool {
        matches!(self, Self::Advertising { .. })
    }
}

/// Result type for peripheral operations
pub type Result<T, E = PeripheralError> = std::result::Result<T, E>;
