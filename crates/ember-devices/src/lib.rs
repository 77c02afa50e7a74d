//! Abstract device collaborator: the `DeviceRegistry` trait plus an
//! in-memory reference implementation and the type/state/event/action
//! catalog model devices publish.
//!
//! Real device protocols (MQTT, UDP, D-Bus, Bluetooth, 433 MHz, UPnP,
//! Avahi) are out of scope here — they're plugins that implement
//! [`DeviceRegistry`] elsewhere.

pub mod catalog;
pub mod registry;

pub use catalog::{ActionTypeDescriptor, DeviceType, DeviceTypeCatalog, EventTypeDescriptor, StateTypeDescriptor};
pub use registry::{Device, DeviceError, DeviceRegistry, InMemoryDeviceRegistry};
