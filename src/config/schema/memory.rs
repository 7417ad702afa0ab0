use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// SQLite file name under `<workspace>/memory/`
    #[serde(default = "default_database_file")]
    pub database_file: String,
    /// Max dispatch-log entries returned by `history`
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_database_file() -> String {
    "replyguard.db".into()
}

fn default_history_limit() -> usize {
    50
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
            history_limit: default_history_limit(),
        }
    }
}
