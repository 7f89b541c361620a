//! In-memory platform stack for tests
//!
//! [`MockStack`] records every command it receives and delivers events that
//! tests inject through the paired [`MockHandle`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::advertising::AdvertisingCommand;
use crate::errors::{GattError, PeripheralError, Result};
use crate::gatt::{RequestOptions, Service};
use crate::platform::{Advertisement, PlatformEvent, PlatformStack};

/// A command the peripheral issued to the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackCall {
    SetAlias(String),
    RegisterService(Uuid),
    StartAdvertising(Advertisement),
    StopAdvertising,
}

#[derive(Debug, Default)]
struct Shared {
    calls: Mutex<Vec<StackCall>>,
    reject_advertising: AtomicBool,
}

impl Shared {
    fn record(&self, call: StackCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

/// Platform stack backed by channels
#[derive(Debug)]
pub struct MockStack {
    adapter: String,
    events: mpsc::UnboundedReceiver<PlatformEvent>,
    shared: Arc<Shared>,
}

/// Test-side handle of a [`MockStack`]
#[derive(Debug, Clone)]
pub struct MockHandle {
    events: mpsc::UnboundedSender<PlatformEvent>,
    shared: Arc<Shared>,
}

impl MockStack {
    pub fn new(adapter: impl Into<String>) -> (Self, MockHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        (
            Self {
                adapter: adapter.into(),
                events: rx,
                shared: shared.clone(),
            },
            MockHandle { events: tx, shared },
        )
    }
}

#[async_trait::async_trait]
impl PlatformStack for MockStack {
    fn adapter_name(&self) -> &str {
        &self.adapter
    }

    async fn set_alias(&mut self, alias: &str) -> Result<()> {
        self.shared.record(StackCall::SetAlias(alias.to_string()));
        Ok(())
    }

    async fn register_service(&mut self, service: &Service) -> Result<()> {
        self.shared.record(StackCall::RegisterService(service.uuid()));
        Ok(())
    }

    async fn start_advertising(&mut self, advertisement: &Advertisement) -> Result<()> {
        self.shared
            .record(StackCall::StartAdvertising(advertisement.clone()));
        self.check_rejection(AdvertisingCommand::Start)
    }

    async fn stop_advertising(&mut self) -> Result<()> {
        self.shared.record(StackCall::StopAdvertising);
        self.check_rejection(AdvertisingCommand::Stop)
    }

    async fn next_event(&mut self) -> Option<PlatformEvent> {
        self.events.recv().await
    }
}

impl MockStack {
    fn check_rejection(&self, command: AdvertisingCommand) -> Result<()> {
        if self.shared.reject_advertising.load(Ordering::SeqCst) {
            return Err(PeripheralError::Advertising {
                command,
                reason: "adapter busy".to_string(),
            });
        }
        Ok(())
    }
}

impl MockHandle {
    pub fn connect(&self, device: &str) {
        self.send(PlatformEvent::RemoteConnected {
            device: device.to_string(),
        });
    }

    pub fn disconnect(&self, device: &str) {
        self.send(PlatformEvent::RemoteDisconnected {
            device: device.to_string(),
        });
    }

    /// Read through the running peripheral loop
    pub async fn read(&self, characteristic: u16) -> std::result::Result<Vec<u8>, GattError> {
        let (reply, rx) = oneshot::channel();
        self.send(PlatformEvent::ReadRequest {
            characteristic,
            options: RequestOptions::from_device("mock-central"),
            reply,
        });
        rx.await.unwrap_or(Err(GattError::UnknownCharacteristic {
            index: characteristic,
        }))
    }

    /// Write through the running peripheral loop
    pub async fn write(
        &self,
        characteristic: u16,
        value: &[u8],
    ) -> std::result::Result<(), GattError> {
        let (reply, rx) = oneshot::channel();
        self.send(PlatformEvent::WriteRequest {
            characteristic,
            value: value.to_vec(),
            options: RequestOptions::from_device("mock-central"),
            reply,
        });
        rx.await.unwrap_or(Err(GattError::UnknownCharacteristic {
            index: characteristic,
        }))
    }

    /// Make every following start/stop advertising command fail
    pub fn reject_advertising(&self, reject: bool) {
        self.shared.reject_advertising.store(reject, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<StackCall> {
        self.shared
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Only the advertising commands, in issue order
    pub fn advertising_calls(&self) -> Vec<AdvertisingCommand> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StackCall::StartAdvertising(_) => Some(AdvertisingCommand::Start),
                StackCall::StopAdvertising => Some(AdvertisingCommand::Stop),
                _ => None,
            })
            .collect()
    }

    fn send(&self, event: PlatformEvent) {
        // The receiver only disappears with the stack itself
        let _ = self.events.send(event);
    }
}
