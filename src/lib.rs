pub mod adapters;
pub mod config;
pub mod controller;
pub mod device_types;
pub mod ports;
pub mod registry;

pub use config::StoreConfig;
pub use controller::{SubscribeError, SubscriptionController};
pub use device_types::{DeviceDescriptor, DeviceRegistration, UserDevicesDocument};
pub use registry::{DeviceRegistry, RegistryError};
