//! Remote connection tracking through BlueZ device objects

use std::collections::HashMap;

use bluer::{Adapter, AdapterEvent, Address, DeviceEvent, DeviceProperty};
use futures::{Stream, StreamExt};
use iotsc_core::PlatformEvent;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::BleError;
use crate::gatt::EventSender;

/// Start forwarding connect/disconnect of remote devices as platform events.
///
/// Devices BlueZ already knows about are watched right away; a device that
/// is connected at that point is reported as a fresh connection.
pub(crate) async fn watch_connections(
    adapter: Adapter,
    events: EventSender,
) -> Result<JoinHandle<()>, BleError> {
    let adapter_events = adapter
        .events()
        .await
        .map_err(|e| BleError::EventStreamFailed(e.to_string()))?;
    let known = adapter
        .device_addresses()
        .await
        .map_err(|e| BleError::EventStreamFailed(e.to_string()))?;

    Ok(tokio::spawn(async move {
        let mut monitor = ConnectionMonitor {
            adapter,
            events,
            watchers: HashMap::new(),
        };
        for address in known {
            monitor.watch(address).await;
        }
        monitor.run(adapter_events).await;
    }))
}

pub(crate) fn connection_event(address: Address, connected: bool) -> PlatformEvent {
    let device = address.to_string();
    if connected {
        PlatformEvent::RemoteConnected { device }
    } else {
        PlatformEvent::RemoteDisconnected { device }
    }
}

/// Forward a connection change; `false` once the peripheral stopped listening
pub(crate) fn report(events: &EventSender, address: Address, connected: bool) -> bool {
    if events.send(connection_event(address, connected)).is_err() {
        debug!("Dropping connection change of {}: event loop is gone", address);
        return false;
    }
    true
}

// ----------------------------------------------------------------------------
// Monitor
// ----------------------------------------------------------------------------

struct ConnectionMonitor {
    adapter: Adapter,
    events: EventSender,
    watchers: HashMap<Address, JoinHandle<()>>,
}

impl ConnectionMonitor {
    async fn run(&mut self, adapter_events: impl Stream<Item = AdapterEvent>) {
        futures::pin_mut!(adapter_events);

        while let Some(event) = adapter_events.next().await {
            if self.events.is_closed() {
                break;
            }
            match event {
                AdapterEvent::DeviceAdded(address) => self.watch(address).await,
                AdapterEvent::DeviceRemoved(address) => {
                    if let Some(watcher) = self.watchers.remove(&address) {
                        debug!("Device {} removed", address);
                        watcher.abort();
                    }
                }
                _ => {}
            }
        }

        info!("Stopped watching connections on {}", self.adapter.name());
        for (_, watcher) in self.watchers.drain() {
            watcher.abort();
        }
    }

    async fn watch(&mut self, address: Address) {
        if self.watchers.contains_key(&address) {
            return;
        }

        let device = match self.adapter.device(address) {
            Ok(device) => device,
            Err(e) => {
                warn!("Cannot watch device {}: {}", address, e);
                return;
            }
        };
        let device_events = match device.events().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Cannot get events of device {}: {}", address, e);
                return;
            }
        };

        if device.is_connected().await.unwrap_or(false) && !report(&self.events, address, true) {
            return;
        }

        let events = self.events.clone();
        let watcher = tokio::spawn(async move {
            futures::pin_mut!(device_events);
            while let Some(event) = device_events.next().await {
                if let DeviceEvent::PropertyChanged(DeviceProperty::Connected(connected)) = event {
                    if !report(&events, address, connected) {
                        break;
                    }
                }
            }
        });
        self.watchers.insert(address, watcher);
    }
}
