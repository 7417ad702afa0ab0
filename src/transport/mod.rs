pub mod bridge;

pub use bridge::{HttpBridge, MessagingBridge};
