mod bridge;
mod contacts;
mod core;
mod memory;
mod pipeline;

pub use bridge::BridgeConfig;
pub use contacts::ContactsConfig;
pub use core::{Config, DEFAULT_POLICY, ReliabilityConfig};
pub use memory::MemoryConfig;
pub use pipeline::{ConflictPolicy, PipelineConfig};
