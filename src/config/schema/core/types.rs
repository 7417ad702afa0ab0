use super::super::{BridgeConfig, ContactsConfig, MemoryConfig, PipelineConfig};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub(super) const CONFIG_DIR_NAME: &str = ".replyguard";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    pub api_key: Option<String>,
    /// OpenAI-compatible base URL (the `/chat/completions` suffix is appended).
    #[serde(default = "default_provider_url")]
    pub provider_url: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,
    /// Behavior policy document handed to the classifier as its system prompt.
    /// `~` is expanded; relative paths resolve against the workspace.
    #[serde(default = "default_policy_path")]
    pub policy_path: String,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub contacts: ContactsConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub reliability: ReliabilityConfig,
}

fn default_provider_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_model() -> String {
    "gpt-4o".into()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_policy_path() -> String {
    "prompt.txt".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    #[serde(default = "default_provider_retries")]
    pub provider_retries: u32,
    #[serde(default = "default_provider_backoff_ms")]
    pub provider_backoff_ms: u64,
}

fn default_provider_retries() -> u32 {
    3
}

fn default_provider_backoff_ms() -> u64 {
    1000
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            provider_retries: default_provider_retries(),
            provider_backoff_ms: default_provider_backoff_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        let replyguard_dir = home.join(CONFIG_DIR_NAME);

        Self {
            workspace_dir: replyguard_dir.join("workspace"),
            config_path: replyguard_dir.join("config.toml"),
            api_key: None,
            provider_url: default_provider_url(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            policy_path: default_policy_path(),
            bridge: BridgeConfig::default(),
            pipeline: PipelineConfig::default(),
            contacts: ContactsConfig::default(),
            memory: MemoryConfig::default(),
            reliability: ReliabilityConfig::default(),
        }
    }
}
