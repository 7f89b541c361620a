//! BlueZ platform stack for the DTN IoTSC BLE peripheral
//!
//! This crate implements [`iotsc_core::PlatformStack`] on top of BlueZ,
//! publishing the peripheral's service as a GATT application and forwarding
//! remote requests and connection changes to the peripheral event loop.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use iotsc_ble::SystemStack;
//! use iotsc_core::{Peripheral, Role, Service};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let stack = SystemStack::connect(Some("hci0")).await?;
//! let mut peripheral = Peripheral::new(stack, "iotsc-node", false);
//! peripheral.add_service(Service::new(0, Role::Sender, "node-17"))?;
//! peripheral.add_advertised_service_uuid(Role::Sender.service_uuid())?;
//! peripheral.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Support
//!
//! - **Linux**: Full support via `bluer` (BlueZ over D-Bus)
//! - **Other platforms**: [`SystemStack::connect`] fails with
//!   [`BleError::Unsupported`]

mod error;
#[cfg(not(target_os = "linux"))]
mod fallback;
#[cfg(target_os = "linux")]
mod gatt;
#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
mod monitor;

pub use error::BleError;
#[cfg(not(target_os = "linux"))]
pub use fallback::UnsupportedStack;
#[cfg(target_os = "linux")]
pub use linux::BluezStack;

/// Platform stack for the current target
#[cfg(target_os = "linux")]
pub type SystemStack = BluezStack;

/// Platform stack for the current target
#[cfg(not(target_os = "linux"))]
pub type SystemStack = UnsupportedStack;
