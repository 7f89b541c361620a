//! GATT object model: a service owning an ordered set of characteristics

pub mod characteristic;
pub mod service;

pub use characteristic::{Capabilities, Characteristic, Operation, RequestOptions, ValueHandler};
pub use service::{DeviceId, DeviceIdHandler, Role, Service};
