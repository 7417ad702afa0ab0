pub mod compatible;
pub mod reliable;
pub mod scrub;
pub mod traits;

pub use compatible::OpenAiCompatibleProvider;
pub use reliable::ReliableProvider;
pub use scrub::sanitize_api_error;
pub use traits::Provider;

use crate::config::Config;
use reqwest::Client;
use std::time::Duration;

pub fn build_provider_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// The configured classifier backend wrapped in retry handling.
pub fn create_provider(config: &Config) -> Box<dyn Provider> {
    let inner = OpenAiCompatibleProvider::new(
        "openai",
        &config.provider_url,
        config.api_key.as_deref(),
        config.pipeline.classifier_timeout_secs,
    );
    Box::new(ReliableProvider::new(
        Box::new(inner),
        config.reliability.provider_retries,
        config.reliability.provider_backoff_ms,
    ))
}
