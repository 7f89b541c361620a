//! Core object model for the DTN IoTSC Bluetooth Low Energy peripheral
//!
//! This crate owns everything in the peripheral that has state and policy,
//! and nothing that talks to real hardware:
//!
//! - [`gatt`] - Characteristics with fixed capability sets, and the one
//!   service a peripheral publishes per role
//! - [`advertising`] - The controller deciding when advertising starts or stops
//! - [`peripheral`] - Event loop tying the service and controller to a platform
//! - [`platform`] - The [`PlatformStack`] seam a Bluetooth backend implements
//! - [`status`] - Connection flag shared with out-of-loop readers
//!
//! ## Usage
//!
//! ```rust,no_run
//! use iotsc_core::{Peripheral, PlatformStack, Role, Service};
//!
//! # async fn example<S: PlatformStack>(stack: S) -> iotsc_core::Result<()> {
//! let role = Role::Sender;
//! let mut peripheral = Peripheral::new(stack, "iotsc-node", false);
//! peripheral.add_service(Service::new(0, role, "node-17"))?;
//! peripheral.add_advertised_service_uuid(role.service_uuid())?;
//!
//! // Registers with the platform, starts advertising and dispatches events
//! peripheral.run().await
//! # }
//! ```

pub mod advertising;
pub mod errors;
pub mod gatt;
pub mod peripheral;
pub mod platform;
pub mod status;
pub mod uuids;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Public API exports
pub use advertising::{
    AdvertisingCommand, AdvertisingController, AdvertisingState, LinkState, Trigger,
};
pub use errors::{GattError, PeripheralError, Result};
pub use gatt::{
    Capabilities, Characteristic, DeviceId, DeviceIdHandler, Operation, RequestOptions, Role,
    Service, ValueHandler,
};
pub use peripheral::Peripheral;
pub use platform::{Advertisement, PlatformEvent, PlatformStack};
pub use status::ConnectionStatus;
