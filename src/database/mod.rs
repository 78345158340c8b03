pub mod connection;
pub mod operations;
pub mod store;

pub use store::{check_device_id, DeviceStore, MemoryDeviceStore, PgDeviceStore};
