pub mod schema;

pub use schema::{
    BridgeConfig, Config, ConflictPolicy, ContactsConfig, DEFAULT_POLICY, MemoryConfig,
    PipelineConfig, ReliabilityConfig,
};
