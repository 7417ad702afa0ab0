use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePool;

const STORE_SCHEMA_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS store_schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";
const STORE_SCHEMA_VERSION_KEY: &str = "store_schema_version";
const STORE_SCHEMA_VERSION: u32 = 1;

const TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS conversation_messages (
         seq         INTEGER PRIMARY KEY AUTOINCREMENT,
         chat_id     TEXT NOT NULL,
         message_id  TEXT NOT NULL,
         chat_name   TEXT NOT NULL,
         sender_name TEXT NOT NULL,
         body        TEXT NOT NULL,
         timestamp   INTEGER NOT NULL,
         is_from_me  INTEGER NOT NULL,
         is_group    INTEGER NOT NULL,
         has_media   INTEGER NOT NULL DEFAULT 0,
         UNIQUE(chat_id, message_id)
     )",
    "CREATE INDEX IF NOT EXISTS idx_conversation_chat_seq
         ON conversation_messages(chat_id, seq)",
    "CREATE TABLE IF NOT EXISTS user_utterances (
         seq       INTEGER PRIMARY KEY AUTOINCREMENT,
         text      TEXT NOT NULL,
         spoken_at TEXT NOT NULL
     )",
    "CREATE TABLE IF NOT EXISTS commitments (
         id           TEXT PRIMARY KEY,
         description  TEXT NOT NULL,
         start_at     TEXT NOT NULL,
         end_at       TEXT NOT NULL,
         participants TEXT NOT NULL DEFAULT '[]',
         CHECK (start_at < end_at)
     )",
    "CREATE INDEX IF NOT EXISTS idx_commitments_start ON commitments(start_at)",
    "CREATE TABLE IF NOT EXISTS dispatch_claims (
         message_id TEXT PRIMARY KEY,
         claimed_at TEXT NOT NULL
     )",
    "CREATE TABLE IF NOT EXISTS dispatch_log (
         message_id  TEXT PRIMARY KEY,
         chat_id     TEXT NOT NULL,
         action      TEXT NOT NULL,
         reason      TEXT NOT NULL,
         sent_text   TEXT,
         recorded_at TEXT NOT NULL
     )",
    "CREATE INDEX IF NOT EXISTS idx_dispatch_log_recorded ON dispatch_log(recorded_at)",
    "CREATE TABLE IF NOT EXISTS pending_replies (
         message_id  TEXT PRIMARY KEY,
         chat_id     TEXT NOT NULL,
         chat_name   TEXT NOT NULL,
         sender_name TEXT NOT NULL,
         body        TEXT NOT NULL,
         summary     TEXT,
         created_at  TEXT NOT NULL,
         resolved    INTEGER NOT NULL DEFAULT 0
     )",
];

/// Refuse to open a database written by a different schema version.
async fn ensure_store_schema_version(pool: &SqlitePool) -> Result<()> {
    sqlx::query(STORE_SCHEMA_META_TABLE)
        .execute(pool)
        .await
        .context("create store_schema_meta table")?;

    let stored_version: Option<(String,)> =
        sqlx::query_as("SELECT value FROM store_schema_meta WHERE key = $1")
            .bind(STORE_SCHEMA_VERSION_KEY)
            .fetch_optional(pool)
            .await
            .context("load store schema version")?;

    if let Some((value,)) = stored_version {
        let parsed = value
            .parse::<u32>()
            .with_context(|| format!("invalid store schema version value: {value}"))?;
        anyhow::ensure!(
            parsed == STORE_SCHEMA_VERSION,
            "incompatible store schema version: stored={parsed}, expected={STORE_SCHEMA_VERSION}. \
remove the memory database and restart."
        );
        return Ok(());
    }

    sqlx::query("INSERT INTO store_schema_meta (key, value) VALUES ($1, $2)")
        .bind(STORE_SCHEMA_VERSION_KEY)
        .bind(STORE_SCHEMA_VERSION.to_string())
        .execute(pool)
        .await
        .context("persist store schema version")?;

    Ok(())
}

pub(super) async fn migrate(pool: &SqlitePool) -> Result<()> {
    ensure_store_schema_version(pool).await?;
    for statement in TABLES {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("apply schema statement: {}", first_line(statement)))?;
    }
    Ok(())
}

fn first_line(statement: &str) -> &str {
    statement.lines().next().unwrap_or(statement).trim()
}
