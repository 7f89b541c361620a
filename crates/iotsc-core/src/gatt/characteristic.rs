//! Capability-gated GATT characteristics

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::errors::GattError;

// ----------------------------------------------------------------------------
// Capabilities
// ----------------------------------------------------------------------------

/// An operation a remote peer can request on a characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// The fixed set of operations a characteristic accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities {
    read: bool,
    write: bool,
}

impl Capabilities {
    pub const NONE: Self = Self::new(false, false);
    pub const READ: Self = Self::new(true, false);
    pub const WRITE: Self = Self::new(false, true);
    pub const READ_WRITE: Self = Self::new(true, true);

    pub const fn new(read: bool, write: bool) -> Self {
        Self { read, write }
    }

    pub const fn can_read(self) -> bool {
        self.read
    }

    pub const fn can_write(self) -> bool {
        self.write
    }

    pub const fn allows(self, operation: Operation) -> bool {
        match operation {
            Operation::Read => self.read,
            Operation::Write => self.write,
        }
    }

    /// GATT flag names, in the order BlueZ lists them
    pub fn flags(self) -> Vec<&'static str> {
        let mut flags = Vec::with_capacity(2);
        if self.read {
            flags.push("read");
        }
        if self.write {
            flags.push("write");
        }
        flags
    }
}

// ----------------------------------------------------------------------------
// Request Options
// ----------------------------------------------------------------------------

/// Transport metadata accompanying a read or write request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Address of the requesting peer, if the platform reports it
    pub device: Option<String>,
    /// Negotiated ATT MTU
    pub mtu: Option<u16>,
    /// Offset into the value
    pub offset: u16,
}

impl RequestOptions {
    pub fn from_device(device: impl Into<String>) -> Self {
        Self {
            device: Some(device.into()),
            ..Default::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Value Handlers
// ----------------------------------------------------------------------------

/// Value semantics of a concrete characteristic.
///
/// Handlers are only reached after the owning [`Characteristic`] has checked
/// its capability set, so they never need to repeat permission checks.
pub trait ValueHandler: Send + Sync + fmt::Debug {
    /// Encode the current value
    fn read_value(&self, uuid: Uuid, options: &RequestOptions) -> Result<Vec<u8>, GattError>;

    /// Decode `value` and apply it to the owning entity
    fn write_value(
        &self,
        uuid: Uuid,
        value: &[u8],
        options: &RequestOptions,
    ) -> Result<(), GattError>;
}

// ----------------------------------------------------------------------------
// Characteristic
// ----------------------------------------------------------------------------

/// A single attribute of a service
#[derive(Debug, Clone)]
pub struct Characteristic {
    index: u16,
    uuid: Uuid,
    capabilities: Capabilities,
    /// Index of the owning service, set when the service adopts it
    service_index: Option<u16>,
    handler: Arc<dyn ValueHandler>,
}

impl Characteristic {
    pub fn new(
        index: u16,
        uuid: Uuid,
        capabilities: Capabilities,
        handler: Arc<dyn ValueHandler>,
    ) -> Self {
        Self {
            index,
            uuid,
            capabilities,
            service_index: None,
            handler,
        }
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn service_index(&self) -> Option<u16> {
        self.service_index
    }

    pub(crate) fn attach_to(&mut self, service_index: u16) {
        self.service_index = Some(service_index);
    }

    /// Object path under which the platform publishes this characteristic
    pub fn object_path(&self) -> Option<String> {
        self.service_index.map(|service| {
            format!(
                "{}/char{}",
                super::service::Service::path_for(service),
                self.index
            )
        })
    }

    /// Answer a read request
    pub fn read(&self, options: &RequestOptions) -> Result<Vec<u8>, GattError> {
        self.check(Operation::Read)?;
        let value = self.handler.read_value(self.uuid, options)?;
        debug!(
            "Read {} bytes from characteristic {} (peer: {:?})",
            value.len(),
            self.uuid,
            options.device
        );
        Ok(value)
    }

    /// Answer a write request
    pub fn write(&self, value: &[u8], options: &RequestOptions) -> Result<(), GattError> {
        self.check(Operation::Write)?;
        debug!(
            "Write of {} bytes to characteristic {} (peer: {:?})",
            value.len(),
            self.uuid,
            options.device
        );
        self.handler.write_value(self.uuid, value, options)
    }

    fn check(&self, operation: Operation) -> Result<(), GattError> {
        if self.capabilities.allows(operation) {
            Ok(())
        } else {
            Err(GattError::Capability {
                uuid: self.uuid,
                operation,
            })
        }
    }
}
