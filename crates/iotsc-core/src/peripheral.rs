//! BLE peripheral: one service, advertising control and event dispatch

use std::collections::BTreeSet;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::advertising::{
    AdvertisingCommand, AdvertisingController, AdvertisingState, LinkState, Trigger,
};
use crate::errors::{GattError, PeripheralError, Result};
use crate::gatt::Service;
use crate::platform::{Advertisement, PlatformEvent, PlatformStack};
use crate::status::ConnectionStatus;

/// Callback run after a remote peer disconnected
pub type DisconnectCallback = Box<dyn FnMut(&Service) + Send>;

// ----------------------------------------------------------------------------
// Peripheral
// ----------------------------------------------------------------------------

/// A single-service BLE peripheral driven by a [`PlatformStack`]
pub struct Peripheral<S> {
    stack: S,
    adapter: String,
    alias: String,
    service: Option<Service>,
    advertised_uuids: BTreeSet<Uuid>,
    controller: AdvertisingController,
    status: ConnectionStatus,
    is_advertising: bool,
    registered: bool,
    on_remote_disconnected: Option<DisconnectCallback>,
}

impl<S: PlatformStack> Peripheral<S> {
    pub fn new(stack: S, alias: impl Into<String>, auto_advertise: bool) -> Self {
        let adapter = stack.adapter_name().to_string();
        Self {
            stack,
            adapter,
            alias: alias.into(),
            service: None,
            advertised_uuids: BTreeSet::new(),
            controller: AdvertisingController::new(auto_advertise),
            status: ConnectionStatus::new(),
            is_advertising: false,
            registered: false,
            on_remote_disconnected: None,
        }
    }

    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn service(&self) -> Option<&Service> {
        self.service.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    pub fn is_advertising(&self) -> bool {
        self.is_advertising
    }

    pub fn link_state(&self) -> LinkState {
        LinkState::new(self.is_connected(), self.is_advertising)
    }

    pub fn advertising_state(&self) -> AdvertisingState {
        self.link_state().into()
    }

    /// Handle to the connection flag for readers outside the event loop
    pub fn status(&self) -> ConnectionStatus {
        self.status.clone()
    }

    /// Register the peripheral's only service
    pub fn add_service(&mut self, service: Service) -> Result<()> {
        if let Some(existing) = &self.service {
            return Err(PeripheralError::AlreadyRegistered {
                uuid: existing.uuid(),
            });
        }

        info!(
            "Adding {} service {} at {}",
            service.role(),
            service.uuid(),
            service.object_path()
        );
        self.service = Some(service);
        Ok(())
    }

    /// Include `uuid` in the advertisement; only possible before [`run`](Self::run)
    pub fn add_advertised_service_uuid(&mut self, uuid: Uuid) -> Result<()> {
        if self.registered {
            return Err(PeripheralError::AlreadyRunning);
        }
        self.advertised_uuids.insert(uuid);
        Ok(())
    }

    pub fn set_on_remote_disconnected<F>(&mut self, callback: F)
    where
        F: FnMut(&Service) + Send + 'static,
    {
        self.on_remote_disconnected = Some(Box::new(callback));
    }

    pub fn advertisement(&self) -> Advertisement {
        Advertisement {
            alias: self.alias.clone(),
            service_uuids: self.advertised_uuids.clone(),
        }
    }

    /// Start advertising outside the controller.
    ///
    /// The controller's memo of its last command is cleared, so the next
    /// evaluation works from the state this leaves behind.
    pub async fn start_advertising(&mut self) -> Result<()> {
        if self.begin_advertising().await? {
            self.controller.reset();
        }
        Ok(())
    }

    /// Stop advertising outside the controller; see [`start_advertising`](Self::start_advertising)
    pub async fn stop_advertising(&mut self) -> Result<()> {
        if self.end_advertising().await? {
            self.controller.reset();
        }
        Ok(())
    }

    /// Returns whether advertising changed
    async fn begin_advertising(&mut self) -> Result<bool> {
        if self.is_advertising {
            return Ok(false);
        }

        let advertisement = self.advertisement();
        self.stack.start_advertising(&advertisement).await?;
        self.is_advertising = true;
        info!("Advertising as '{}' on {}", self.alias, self.adapter);
        Ok(true)
    }

    async fn end_advertising(&mut self) -> Result<bool> {
        if !self.is_advertising {
            return Ok(false);
        }

        self.stack.stop_advertising().await?;
        self.is_advertising = false;
        info!("Stopped advertising on {}", self.adapter);
        Ok(true)
    }

    /// Publish the service and alias with the platform
    pub async fn register(&mut self) -> Result<()> {
        if self.registered {
            return Ok(());
        }

        let service = self.service.as_ref().ok_or(PeripheralError::NotRegistered)?;
        self.stack.set_alias(&self.alias).await?;
        self.stack.register_service(service).await?;
        self.registered = true;
        info!(
            "Registered service {} on adapter {}",
            service.uuid(),
            self.adapter
        );
        Ok(())
    }

    /// Register and bring advertising to its desired state
    pub async fn start(&mut self) -> Result<()> {
        self.register().await?;
        self.update_advertising_state(Trigger::Startup).await
    }

    /// Start, then dispatch platform events until the platform goes away or
    /// an error must be surfaced
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        loop {
            let event = self
                .stack
                .next_event()
                .await
                .ok_or(PeripheralError::EventSourceClosed)?;
            self.handle_event(event).await?;
        }
    }

    /// Stop advertising before the process exits
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down peripheral on {}", self.adapter);
        self.stop_advertising().await
    }

    /// Dispatch one platform event
    pub async fn handle_event(&mut self, event: PlatformEvent) -> Result<()> {
        match event {
            PlatformEvent::RemoteConnected { device } => {
                info!("Remote device {} connected", device);
                let result = self.update_advertising_state(Trigger::RemoteConnected).await;
                self.status.set_connected(true);
                result
            }
            PlatformEvent::RemoteDisconnected { device } => {
                info!("Remote device {} disconnected", device);
                let result = self
                    .update_advertising_state(Trigger::RemoteDisconnected)
                    .await;
                self.status.set_connected(false);
                if let (Some(callback), Some(service)) =
                    (self.on_remote_disconnected.as_mut(), self.service.as_ref())
                {
                    callback(service);
                }
                result
            }
            PlatformEvent::ReadRequest {
                characteristic,
                options,
                reply,
            } => {
                let service = self.service.as_ref().ok_or(PeripheralError::NotRegistered)?;
                let result = service
                    .characteristic(characteristic)
                    .ok_or(GattError::UnknownCharacteristic {
                        index: characteristic,
                    })
                    .and_then(|c| c.read(&options));
                answer(reply, result)
            }
            PlatformEvent::WriteRequest {
                characteristic,
                value,
                options,
                reply,
            } => {
                let service = self.service.as_ref().ok_or(PeripheralError::NotRegistered)?;
                let result = service
                    .characteristic(characteristic)
                    .ok_or(GattError::UnknownCharacteristic {
                        index: characteristic,
                    })
                    .and_then(|c| c.write(&value, &options));
                answer(reply, result)
            }
        }
    }

    async fn update_advertising_state(&mut self, trigger: Trigger) -> Result<()> {
        let observed = self.link_state();
        let Some(command) = self.controller.evaluate(trigger, observed) else {
            debug!(
                "No advertising change for {:?} in state {:?}",
                trigger,
                AdvertisingState::from(observed)
            );
            return Ok(());
        };

        let result = match command {
            AdvertisingCommand::Start => {
                info!("Starting BLE advertisements.");
                self.begin_advertising().await.map(drop)
            }
            AdvertisingCommand::Stop => {
                info!("BLE connected. Stopping BLE advertisements.");
                self.end_advertising().await.map(drop)
            }
        };

        if let Err(e) = &result {
            error!("Failed to {}: {}", command, e);
            self.controller.reset();
        }
        result
    }
}

/// Send `result` back to the requester and decide whether the loop goes on.
///
/// Bad remote payloads are answered and tolerated; anything else is misuse of
/// the object model and stops the loop after answering.
fn answer<T>(
    reply: oneshot::Sender<std::result::Result<T, GattError>>,
    result: std::result::Result<T, GattError>,
) -> Result<()> {
    let fatal = match &result {
        Ok(_) => None,
        Err(e) if e.is_remote_fault() => {
            warn!("Rejected request: {}", e);
            None
        }
        Err(e) => {
            error!("Invalid request on GATT object model: {}", e);
            Some(e.clone())
        }
    };

    if reply.send(result).is_err() {
        debug!("Requester went away before the reply was sent");
    }

    match fatal {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
