//! GATT application built from the core service model
//!
//! BlueZ invokes the read/write closures on its own tasks. They never touch
//! the service directly: each request is forwarded to the peripheral event
//! loop as a [`PlatformEvent`] and the closure awaits the reply.

use bluer::gatt::local::{
    Application, Characteristic as GattCharacteristic, CharacteristicRead,
    CharacteristicReadRequest, CharacteristicWrite, CharacteristicWriteMethod,
    CharacteristicWriteRequest, ReqError, Service as GattService,
};
use bluer::Address;
use iotsc_core::{Characteristic, GattError, PlatformEvent, RequestOptions, Service};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

pub(crate) type EventSender = mpsc::UnboundedSender<PlatformEvent>;

// ----------------------------------------------------------------------------
// Application
// ----------------------------------------------------------------------------

/// Build the BlueZ application publishing `service`
pub(crate) fn application(service: &Service, events: &EventSender) -> Application {
    let characteristics = service
        .characteristics()
        .iter()
        .map(|c| characteristic(c, events))
        .collect();

    Application {
        services: vec![GattService {
            uuid: service.uuid(),
            primary: service.is_primary(),
            characteristics,
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn characteristic(characteristic: &Characteristic, events: &EventSender) -> GattCharacteristic {
    let index = characteristic.index();
    let capabilities = characteristic.capabilities();
    debug!(
        "Publishing characteristic {} with flags {:?}",
        characteristic.uuid(),
        capabilities.flags()
    );

    let read = capabilities.can_read().then(|| {
        let events = events.clone();
        CharacteristicRead {
            read: true,
            fun: Box::new(move |req: CharacteristicReadRequest| {
                let events = events.clone();
                Box::pin(async move {
                    let options = request_options(req.device_address, req.offset, req.mtu);
                    forward_read(&events, index, options).await
                })
            }),
            ..Default::default()
        }
    });

    let write = capabilities.can_write().then(|| {
        let events = events.clone();
        CharacteristicWrite {
            write: true,
            method: CharacteristicWriteMethod::Fun(Box::new(
                move |value: Vec<u8>, req: CharacteristicWriteRequest| {
                    let events = events.clone();
                    Box::pin(async move {
                        let options = request_options(req.device_address, req.offset, req.mtu);
                        forward_write(&events, index, value, options).await
                    })
                },
            )),
            ..Default::default()
        }
    });

    GattCharacteristic {
        uuid: characteristic.uuid(),
        read,
        write,
        ..Default::default()
    }
}

// ----------------------------------------------------------------------------
// Request Forwarding
// ----------------------------------------------------------------------------

pub(crate) fn request_options(device: Address, offset: u16, mtu: u16) -> RequestOptions {
    RequestOptions {
        device: Some(device.to_string()),
        mtu: Some(mtu),
        offset,
    }
}

/// ATT error reported to the remote peer
pub(crate) fn req_error(err: &GattError) -> ReqError {
    match err {
        GattError::Capability { .. } => ReqError::NotPermitted,
        GattError::UnknownCharacteristic { .. } => ReqError::NotSupported,
        GattError::InvalidOffset { .. } => ReqError::InvalidOffset,
        GattError::Decode { .. } | GattError::DuplicateIndex { .. } => ReqError::Failed,
    }
}

pub(crate) async fn forward_read(
    events: &EventSender,
    characteristic: u16,
    options: RequestOptions,
) -> Result<Vec<u8>, ReqError> {
    let (reply, rx) = oneshot::channel();
    events
        .send(PlatformEvent::ReadRequest {
            characteristic,
            options,
            reply,
        })
        .map_err(|_| {
            warn!("Read on characteristic {} after the peripheral stopped", characteristic);
            ReqError::Failed
        })?;

    match rx.await {
        Ok(result) => result.map_err(|e| req_error(&e)),
        Err(_) => Err(ReqError::Failed),
    }
}

pub(crate) async fn forward_write(
    events: &EventSender,
    characteristic: u16,
    value: Vec<u8>,
    options: RequestOptions,
) -> Result<(), ReqError> {
    let (reply, rx) = oneshot::channel();
    events
        .send(PlatformEvent::WriteRequest {
            characteristic,
            value,
            options,
            reply,
        })
        .map_err(|_| {
            warn!("Write on characteristic {} after the peripheral stopped", characteristic);
            ReqError::Failed
        })?;

    match rx.await {
        Ok(result) => result.map_err(|e| req_error(&e)),
        Err(_) => Err(ReqError::Failed),
    }
}
