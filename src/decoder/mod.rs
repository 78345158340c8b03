pub mod message;
pub mod payload;

pub use message::{decode_message, validate_message};
pub use payload::decode_arduino_pm_hex;
