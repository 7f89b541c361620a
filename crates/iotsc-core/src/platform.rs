//! Platform Bluetooth stack seam
//!
//! A backend publishes the service, forwards read/write requests and
//! connection changes as [`PlatformEvent`]s, and executes advertising
//! commands. The peripheral consumes events one at a time, so requests and
//! connection changes are never handled concurrently.

use std::collections::BTreeSet;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::errors::{GattError, Result};
use crate::gatt::{RequestOptions, Service};

// ----------------------------------------------------------------------------
// Advertisement and Events
// ----------------------------------------------------------------------------

/// Advertisement payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advertisement {
    pub alias: String,
    pub service_uuids: BTreeSet<Uuid>,
}

/// Reply channel for a read request
pub type ReadReply = oneshot::Sender<std::result::Result<Vec<u8>, GattError>>;

/// Reply channel for a write request
pub type WriteReply = oneshot::Sender<std::result::Result<(), GattError>>;

/// Something the platform delivered to the peripheral
#[derive(Debug)]
pub enum PlatformEvent {
    RemoteConnected {
        device: String,
    },
    RemoteDisconnected {
        device: String,
    },
    ReadRequest {
        characteristic: u16,
        options: RequestOptions,
        reply: ReadReply,
    },
    WriteRequest {
        characteristic: u16,
        value: Vec<u8>,
        options: RequestOptions,
        reply: WriteReply,
    },
}

// ----------------------------------------------------------------------------
// Platform Stack Trait
// ----------------------------------------------------------------------------

/// Interface to the platform Bluetooth stack
#[async_trait::async_trait]
pub trait PlatformStack: Send {
    /// Identifier of the adapter this stack drives
    fn adapter_name(&self) -> &str;

    /// Set the name the adapter is known by
    async fn set_alias(&mut self, alias: &str) -> Result<()>;

    /// Publish `service` so that read/write requests for its characteristics
    /// arrive as events
    async fn register_service(&mut self, service: &Service) -> Result<()>;

    /// Start advertising `advertisement`
    async fn start_advertising(&mut self, advertisement: &Advertisement) -> Result<()>;

    /// Stop advertising
    async fn stop_advertising(&mut self) -> Result<()>;

    /// Next event, or `None` once the platform has gone away
    async fn next_event(&mut self) -> Option<PlatformEvent>;
}
