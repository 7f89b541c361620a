//! Linux platform stack using bluer (BlueZ)

use bluer::adv::{Advertisement as BluezAdvertisement, AdvertisementHandle, Type};
use bluer::gatt::local::ApplicationHandle;
use bluer::{Adapter, Session};
use iotsc_core::{
    Advertisement, AdvertisingCommand, PlatformEvent, PlatformStack, Result as PeripheralResult,
    Service,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::BleError;
use crate::gatt::{self, EventSender};
use crate::monitor;

// ----------------------------------------------------------------------------
// Linux Implementation
// ----------------------------------------------------------------------------

/// BlueZ-backed [`PlatformStack`].
///
/// Dropping the stack unregisters the GATT application and stops
/// advertising.
pub struct BluezStack {
    _session: Session,
    adapter: Adapter,
    adapter_name: String,
    events_tx: EventSender,
    events_rx: mpsc::UnboundedReceiver<PlatformEvent>,
    application: Option<ApplicationHandle>,
    advertisement: Option<AdvertisementHandle>,
    monitor: Option<JoinHandle<()>>,
}

impl BluezStack {
    /// Open a BlueZ session on adapter `name`, or the default adapter, and power
    /// it on if needed
    pub async fn connect(name: Option<&str>) -> Result<Self, BleError> {
        let session = Session::new()
            .await
            .map_err(|e| BleError::Session(e.to_string()))?;

        let not_available = |e: bluer::Error| BleError::AdapterNotAvailable {
            name: name.unwrap_or("default").to_string(),
            reason: e.to_string(),
        };
        let adapter = match name {
            Some(name) => session.adapter(name).map_err(not_available)?,
            None => session.default_adapter().await.map_err(not_available)?,
        };
        let adapter_name = adapter.name().to_string();

        // Looking up a named adapter is lazy; the first property read fails
        // if it does not exist
        let powered = adapter.is_powered().await.map_err(not_available)?;
        if !powered {
            info!("Powering on Bluetooth adapter {}", adapter_name);
            adapter
                .set_powered(true)
                .await
                .map_err(|e| BleError::PowerOn {
                    name: adapter_name.clone(),
                    reason: e.to_string(),
                })?;
        }

        info!("Using Bluetooth adapter {}", adapter_name);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            _session: session,
            adapter,
            adapter_name,
            events_tx,
            events_rx,
            application: None,
            advertisement: None,
            monitor: None,
        })
    }
}

#[async_trait::async_trait]
impl PlatformStack for BluezStack {
    fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    async fn set_alias(&mut self, alias: &str) -> PeripheralResult<()> {
        self.adapter
            .set_alias(alias.to_string())
            .await
            .map_err(|e| BleError::Alias(e.to_string()))?;
        debug!("Adapter {} alias set to '{}'", self.adapter_name, alias);
        Ok(())
    }

    async fn register_service(&mut self, service: &Service) -> PeripheralResult<()> {
        let app = gatt::application(service, &self.events_tx);
        let handle = self
            .adapter
            .serve_gatt_application(app)
            .await
            .map_err(|e| BleError::GattRegistration(e.to_string()))?;
        self.application = Some(handle);

        let monitor = monitor::watch_connections(self.adapter.clone(), self.events_tx.clone()).await?;
        self.monitor = Some(monitor);

        info!("GATT service {} registered with BlueZ", service.uuid());
        Ok(())
    }

    async fn start_advertising(&mut self, advertisement: &Advertisement) -> PeripheralResult<()> {
        let advertisement = BluezAdvertisement {
            advertisement_type: Type::Peripheral,
            service_uuids: advertisement.service_uuids.clone(),
            local_name: Some(advertisement.alias.clone()),
            discoverable: Some(true),
            ..Default::default()
        };

        let handle = self
            .adapter
            .advertise(advertisement)
            .await
            .map_err(|e| BleError::Advertising {
                command: AdvertisingCommand::Start,
                reason: e.to_string(),
            })?;
        self.advertisement = Some(handle);
        Ok(())
    }

    async fn stop_advertising(&mut self) -> PeripheralResult<()> {
        // Dropping the handle unregisters the advertisement
        if self.advertisement.take().is_some() {
            debug!("Advertisement on {} released", self.adapter_name);
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Option<PlatformEvent> {
        self.events_rx.recv().await
    }
}

impl Drop for BluezStack {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
        if self.application.take().is_some() {
            debug!("GATT application on {} released", self.adapter_name);
        }
    }
}
