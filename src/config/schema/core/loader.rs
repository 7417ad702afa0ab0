use super::types::CONFIG_DIR_NAME;
use super::Config;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::PathBuf;

/// Policy used when no policy document exists in the workspace.
pub const DEFAULT_POLICY: &str = "You are the user's personal assistant watching their WhatsApp. \
Auto-reply only to simple, low-stakes messages where the user's answer is obvious from context \
(acknowledgements, confirmations of plans the user already agreed to, polite declines when the \
user is busy). Anything personal, financial, emotional, or ambiguous must be left to the user.";

/// Upper bound for `pipeline.lookahead_hours` (one leap year).
pub const MAX_LOOKAHEAD_HOURS: i64 = 24 * 366;
/// Upper bound for `pipeline.default_event_minutes` (one day).
pub const MAX_EVENT_MINUTES: i64 = 24 * 60;

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let replyguard_dir = home.join(CONFIG_DIR_NAME);
        let config_path = replyguard_dir.join("config.toml");

        if !replyguard_dir.exists() {
            fs::create_dir_all(&replyguard_dir)
                .context("Failed to create .replyguard directory")?;
            fs::create_dir_all(replyguard_dir.join("workspace"))
                .context("Failed to create workspace directory")?;
        }

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config = toml::from_str(&contents)
                .map_err(|e| ConfigError::Load(e.to_string()))
                .context("Failed to parse config file")?;
            config.config_path.clone_from(&config_path);
            config.workspace_dir = replyguard_dir.join("workspace");
            config
        } else {
            let config = Self {
                config_path: config_path.clone(),
                workspace_dir: replyguard_dir.join("workspace"),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    /// Reject settings that would weaken the auto-reply guarantees.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let floor = self.pipeline.confidence_floor;
        if !(0.5..=1.0).contains(&floor) {
            return Err(ConfigError::Validation(format!(
                "pipeline.confidence_floor must be within [0.5, 1.0], got {floor}"
            )));
        }

        for (name, value) in [
            ("contacts.close_threshold", self.contacts.close_threshold),
            ("contacts.known_threshold", self.contacts.known_threshold),
            ("contacts.unknown_threshold", self.contacts.unknown_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "{name} must be within [0.0, 1.0], got {value}"
                )));
            }
        }

        if self.pipeline.conversation_window == 0 || self.pipeline.user_window == 0 {
            return Err(ConfigError::Validation(
                "rolling window sizes must be greater than zero".into(),
            ));
        }

        let lookahead = self.pipeline.lookahead_hours;
        if !(1..=MAX_LOOKAHEAD_HOURS).contains(&lookahead) {
            return Err(ConfigError::Validation(format!(
                "pipeline.lookahead_hours must be within [1, {MAX_LOOKAHEAD_HOURS}], got {lookahead}"
            )));
        }

        let event_minutes = self.pipeline.default_event_minutes;
        if !(1..=MAX_EVENT_MINUTES).contains(&event_minutes) {
            return Err(ConfigError::Validation(format!(
                "pipeline.default_event_minutes must be within [1, {MAX_EVENT_MINUTES}], got {event_minutes}"
            )));
        }

        if self.bridge.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "bridge.poll_interval_secs must be greater than zero".into(),
            ));
        }

        if self.pipeline.classifier_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "pipeline.classifier_timeout_secs must be greater than zero".into(),
            ));
        }

        url::Url::parse(&self.bridge.url)
            .map_err(|e| ConfigError::Validation(format!("bridge.url is invalid: {e}")))?;
        url::Url::parse(&self.provider_url)
            .map_err(|e| ConfigError::Validation(format!("provider_url is invalid: {e}")))?;

        Ok(())
    }

    /// The classifier credential. Commands that talk to the model call this
    /// before doing anything else so a missing key aborts at startup.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ConfigError::MissingCredential(
                    "api_key not set. Add it to ~/.replyguard/config.toml or export \
REPLYGUARD_API_KEY / OPENAI_API_KEY."
                        .into(),
                )
            })
    }

    pub fn policy_file(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.policy_path).into_owned();
        let path = PathBuf::from(expanded);
        if path.is_absolute() {
            path
        } else {
            self.workspace_dir.join(path)
        }
    }

    /// Read the behavior policy, falling back to the built-in one.
    pub fn load_policy(&self) -> String {
        let path = self.policy_file();
        match fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                tracing::warn!(path = %path.display(), "policy file is empty; using built-in policy");
                DEFAULT_POLICY.to_string()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "policy file unreadable ({e}); using built-in policy");
                DEFAULT_POLICY.to_string()
            }
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.workspace_dir
            .join("memory")
            .join(&self.memory.database_file)
    }
}
