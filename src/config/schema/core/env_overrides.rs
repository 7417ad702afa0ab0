use super::Config;
use std::path::PathBuf;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) =
            std::env::var("REPLYGUARD_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY"))
            && !key.is_empty()
        {
            self.api_key = Some(key);
        }

        if let Ok(model) = std::env::var("REPLYGUARD_MODEL")
            && !model.is_empty()
        {
            self.default_model = model;
        }

        if let Ok(url) = std::env::var("REPLYGUARD_PROVIDER_URL")
            && !url.is_empty()
        {
            self.provider_url = url;
        }

        if let Ok(url) = std::env::var("REPLYGUARD_BRIDGE_URL")
            && !url.is_empty()
        {
            self.bridge.url = url;
        }

        if let Ok(workspace) = std::env::var("REPLYGUARD_WORKSPACE")
            && !workspace.is_empty()
        {
            self.workspace_dir = PathBuf::from(workspace);
        }

        if let Ok(temp_str) = std::env::var("REPLYGUARD_TEMPERATURE")
            && let Ok(temp) = temp_str.parse::<f64>()
            && (0.0..=2.0).contains(&temp)
        {
            self.default_temperature = temp;
        }
    }
}
