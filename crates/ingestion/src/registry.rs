mod device_registry_client;

pub use device_registry_client::*;
