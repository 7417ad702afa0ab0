mod env_overrides;
mod loader;
mod types;

pub use loader::DEFAULT_POLICY;
pub use types::{Config, ReliabilityConfig};
