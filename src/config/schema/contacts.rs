use serde::{Deserialize, Serialize};

/// Who the user is and how close each sender is.
///
/// The tier thresholds only ever raise the pipeline's confidence floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactsConfig {
    /// Names the user goes by. A group message must mention one of them
    /// (plain or as `@alias`) to be considered addressed to the user.
    #[serde(default)]
    pub user_aliases: Vec<String>,
    /// Sender or chat names treated as close relations (family, partner).
    #[serde(default)]
    pub close: Vec<String>,
    #[serde(default = "default_close_threshold")]
    pub close_threshold: f64,
    #[serde(default = "default_known_threshold")]
    pub known_threshold: f64,
    #[serde(default = "default_unknown_threshold")]
    pub unknown_threshold: f64,
}

fn default_close_threshold() -> f64 {
    0.75
}

fn default_known_threshold() -> f64 {
    0.5
}

fn default_unknown_threshold() -> f64 {
    0.6
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            user_aliases: Vec::new(),
            close: Vec::new(),
            close_threshold: default_close_threshold(),
            known_threshold: default_known_threshold(),
            unknown_threshold: default_unknown_threshold(),
        }
    }
}
