pub mod sqlite;
pub mod traits;
pub mod types;
pub mod window;

pub use sqlite::{SqliteMemoryStore, StoreLimits};
pub use traits::{MemoryStore, StoreFuture};
pub use types::{Commitment, DispatchAction, DispatchRecord, PendingReply, UserUtterance};
pub use window::RollingWindow;

use crate::config::Config;
use std::sync::Arc;

/// Open the configured on-disk store.
pub async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn MemoryStore>> {
    let limits = StoreLimits {
        conversation_window: config.pipeline.conversation_window,
        user_window: config.pipeline.user_window,
    };
    let path = config.database_path();
    tracing::debug!(path = %path.display(), "opening memory store");
    let store = SqliteMemoryStore::open(&path, limits).await?;
    Ok(Arc::new(store))
}
