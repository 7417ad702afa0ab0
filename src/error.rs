use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `replyguard`.
///
/// Each pipeline boundary defines its own error variant. The pipeline matches
/// on these to pick a fail-closed fallback; application glue continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum RelayError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Messaging bridge ────────────────────────────────────────────────
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    // ── Language-model classifier ───────────────────────────────────────
    #[error("classifier: {0}")]
    Classifier(#[from] ClassifierError),

    // ── Memory store ────────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Conflict extraction ─────────────────────────────────────────────
    #[error("conflict: {0}")]
    Conflict(#[from] ConflictError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

/// Startup configuration problems. These are the only fatal errors: they
/// abort before the poller starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Transport errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TransportError {
    /// The bridge answered but its messaging client is not paired/ready.
    #[error("messaging bridge not ready")]
    Unavailable,

    #[error("bridge request {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("bridge rejected {endpoint} ({status}): {message}")]
    Rejected {
        endpoint: String,
        status: u16,
        message: String,
    },
}

// ─── Classifier errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("malformed classifier response: {0}")]
    Malformed(String),

    #[error("classifier request failed: {0}")]
    Request(String),
}

// ─── Store errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                Self::Unavailable(err.to_string())
            }
            other => Self::Query(other.to_string()),
        }
    }
}

// ─── Conflict errors ─────────────────────────────────────────────────────────

/// Non-fatal: the checker logs it and stays permissive.
#[derive(Debug, Error)]
pub enum ConflictError {
    #[error("ambiguous time expression: {0}")]
    Ambiguous(String),
}
