use serde::{Deserialize, Serialize};

/// Connection settings for the external WhatsApp bridge process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Bridge base URL (default: `http://127.0.0.1:3000`)
    #[serde(default = "default_bridge_url")]
    pub url: String,
    /// Seconds between `GET /messages/new` polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Extra wait after a failed poll before trying again
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
    /// Per-request timeout for bridge calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How long `run` waits for the bridge to report ready before polling anyway
    #[serde(default = "default_ready_wait_secs")]
    pub ready_wait_secs: u64,
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:3000".into()
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_error_backoff_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_ready_wait_secs() -> u64 {
    120
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
            poll_interval_secs: default_poll_interval_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            ready_wait_secs: default_ready_wait_secs(),
        }
    }
}
