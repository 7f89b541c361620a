//! The IoTSC GATT service and its device identifier characteristic

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::GattError;
use crate::uuids::{COLLECTOR_SERVICE_UUID, DEVICE_ID_CHARACTERISTIC_UUID, SENDER_SERVICE_UUID};

use super::characteristic::{Capabilities, Characteristic, RequestOptions, ValueHandler};

const SERVICE_PATH_BASE: &str = "/org/bluez/dtniotsc/service";

// ----------------------------------------------------------------------------
// Role
// ----------------------------------------------------------------------------

/// Operating mode of the peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Writes identities learned from peers into its own state
    Collector,
    /// Exposes its own identity for peers to read
    #[default]
    Sender,
}

impl Role {
    pub fn from_collector_flag(is_collector: bool) -> Self {
        if is_collector {
            Self::Collector
        } else {
            Self::Sender
        }
    }

    pub fn is_collector(self) -> bool {
        self == Self::Collector
    }

    pub fn service_uuid(self) -> Uuid {
        match self {
            Self::Collector => COLLECTOR_SERVICE_UUID,
            Self::Sender => SENDER_SERVICE_UUID,
        }
    }

    /// Collectors accept identities, senders publish theirs
    pub fn device_id_capabilities(self) -> Capabilities {
        match self {
            Self::Collector => Capabilities::WRITE,
            Self::Sender => Capabilities::READ,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collector => write!(f, "collector"),
            Self::Sender => write!(f, "sender"),
        }
    }
}

// ----------------------------------------------------------------------------
// Device Identifier
// ----------------------------------------------------------------------------

/// Shared device identifier value.
///
/// Cloning yields another handle to the same value, so the service and any
/// characteristic proxying it always agree.
#[derive(Debug, Clone, Default)]
pub struct DeviceId(Arc<RwLock<String>>);

impl DeviceId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(value.into())))
    }

    pub fn get(&self) -> String {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, value: impl Into<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = value.into();
    }
}

/// Proxies a characteristic value to a [`DeviceId`] as UTF-8 text
#[derive(Debug, Clone)]
pub struct DeviceIdHandler {
    device_id: DeviceId,
}

impl DeviceIdHandler {
    pub fn new(device_id: DeviceId) -> Self {
        Self { device_id }
    }
}

impl ValueHandler for DeviceIdHandler {
    fn read_value(&self, uuid: Uuid, options: &RequestOptions) -> Result<Vec<u8>, GattError> {
        let value = self.device_id.get();
        let offset = usize::from(options.offset);
        // Long values are read in pieces, each request continuing at `offset`
        let Some(remaining) = value.as_bytes().get(offset..) else {
            return Err(GattError::InvalidOffset {
                uuid,
                offset: options.offset,
                len: value.len(),
            });
        };
        if offset == 0 {
            info!("Sending DeviceID value: {}", value);
        }
        Ok(remaining.to_vec())
    }

    fn write_value(
        &self,
        uuid: Uuid,
        value: &[u8],
        options: &RequestOptions,
    ) -> Result<(), GattError> {
        let received = std::str::from_utf8(value).map_err(|e| GattError::Decode {
            uuid,
            reason: e.to_string(),
        })?;
        info!(
            "Received DeviceID: {} (from {})",
            received,
            options.device.as_deref().unwrap_or("unknown peer")
        );
        self.device_id.set(received);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Service
// ----------------------------------------------------------------------------

/// The one GATT service a peripheral publishes
#[derive(Debug, Clone)]
pub struct Service {
    index: u16,
    uuid: Uuid,
    primary: bool,
    role: Role,
    device_id: DeviceId,
    characteristics: Vec<Characteristic>,
}

impl Service {
    /// Index of the device identifier characteristic
    pub const DEVICE_ID_INDEX: u16 = 0;

    /// Build the primary service for `role`, publishing `device_id`
    pub fn new(index: u16, role: Role, device_id: impl Into<String>) -> Self {
        let device_id = DeviceId::new(device_id);
        let mut device_id_characteristic = Characteristic::new(
            Self::DEVICE_ID_INDEX,
            DEVICE_ID_CHARACTERISTIC_UUID,
            role.device_id_capabilities(),
            Arc::new(DeviceIdHandler::new(device_id.clone())),
        );
        device_id_characteristic.attach_to(index);

        Self {
            index,
            uuid: role.service_uuid(),
            primary: true,
            role,
            device_id,
            characteristics: vec![device_id_characteristic],
        }
    }

    pub(crate) fn path_for(index: u16) -> String {
        format!("{SERVICE_PATH_BASE}{index}")
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn object_path(&self) -> String {
        Self::path_for(self.index)
    }

    /// Characteristics in the order they are presented to peers
    pub fn characteristics(&self) -> &[Characteristic] {
        &self.characteristics
    }

    pub fn characteristic(&self, index: u16) -> Option<&Characteristic> {
        self.characteristics.iter().find(|c| c.index() == index)
    }

    pub fn add_characteristic(&mut self, mut characteristic: Characteristic) -> Result<(), GattError> {
        if self.characteristic(characteristic.index()).is_some() {
            return Err(GattError::DuplicateIndex {
                index: characteristic.index(),
                service: self.uuid,
            });
        }

        characteristic.attach_to(self.index);
        self.characteristics.push(characteristic);
        Ok(())
    }

    pub fn device_id(&self) -> String {
        self.device_id.get()
    }

    /// Handle to the identifier value backing the device id characteristic
    pub fn device_id_handle(&self) -> DeviceId {
        self.device_id.clone()
    }

    pub fn set_device_id(&self, device_id: impl Into<String>) {
        let device_id = device_id.into();
        info!("New deviceid: {}", device_id);
        self.device_id.set(device_id);
    }
}
