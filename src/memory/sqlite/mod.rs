mod schema;

use super::traits::{MemoryStore, StoreFuture};
use super::types::{Commitment, DispatchAction, DispatchRecord, PendingReply, UserUtterance};
use crate::error::StoreError;
use crate::transport::bridge::Message;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

/// Window sizes enforced on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub conversation_window: usize,
    pub user_window: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            conversation_window: 50,
            user_window: 30,
        }
    }
}

/// SQLite-backed [`MemoryStore`] using an sqlx async pool.
pub struct SqliteMemoryStore {
    pool: SqlitePool,
    limits: StoreLimits,
}

impl SqliteMemoryStore {
    /// Open (creating if needed) the database file and run migrations.
    pub async fn open(path: &Path, limits: StoreLimits) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        Self::new(pool, limits).await
    }

    /// Private in-process database. A single connection that never idles out
    /// keeps the data alive for the store's lifetime.
    pub async fn in_memory(limits: StoreLimits) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::new(pool, limits).await
    }

    pub async fn new(pool: SqlitePool, limits: StoreLimits) -> anyhow::Result<Self> {
        schema::migrate(&pool).await?;
        Ok(Self { pool, limits })
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    /// Close the pool; every later call fails with `StoreError::Unavailable`.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("invalid stored timestamp {raw:?}: {e}")))
}

fn limit_i64(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

const MESSAGE_COLUMNS: &str =
    "message_id, chat_id, chat_name, sender_name, body, timestamp, is_from_me, is_group, has_media";

fn map_message_row(row: &SqliteRow) -> Result<Message, StoreError> {
    Ok(Message {
        id: row.try_get("message_id")?,
        chat_id: row.try_get("chat_id")?,
        chat_name: row.try_get("chat_name")?,
        sender_name: row.try_get("sender_name")?,
        body: row.try_get("body")?,
        timestamp: row.try_get("timestamp")?,
        is_from_me: row.try_get("is_from_me")?,
        is_group: row.try_get("is_group")?,
        has_media: row.try_get("has_media")?,
    })
}

fn map_commitment_row(row: &SqliteRow) -> Result<Commitment, StoreError> {
    let start_raw: String = row.try_get("start_at")?;
    let end_raw: String = row.try_get("end_at")?;
    let participants_raw: String = row.try_get("participants")?;
    let participants = serde_json::from_str(&participants_raw)
        .map_err(|e| StoreError::Query(format!("invalid participants column: {e}")))?;
    Ok(Commitment {
        id: row.try_get("id")?,
        description: row.try_get("description")?,
        start: decode_ts(&start_raw)?,
        end: decode_ts(&end_raw)?,
        participants,
    })
}

fn map_dispatch_row(row: &SqliteRow) -> Result<DispatchRecord, StoreError> {
    let action_raw: String = row.try_get("action")?;
    let recorded_raw: String = row.try_get("recorded_at")?;
    Ok(DispatchRecord {
        message_id: row.try_get("message_id")?,
        chat_id: row.try_get("chat_id")?,
        action: action_raw
            .parse::<DispatchAction>()
            .map_err(|_| StoreError::Query(format!("unknown dispatch action: {action_raw}")))?,
        reason: row.try_get("reason")?,
        sent_text: row.try_get("sent_text")?,
        recorded_at: decode_ts(&recorded_raw)?,
    })
}

fn map_pending_row(row: &SqliteRow) -> Result<PendingReply, StoreError> {
    let created_raw: String = row.try_get("created_at")?;
    Ok(PendingReply {
        message_id: row.try_get("message_id")?,
        chat_id: row.try_get("chat_id")?,
        chat_name: row.try_get("chat_name")?,
        sender_name: row.try_get("sender_name")?,
        body: row.try_get("body")?,
        summary: row.try_get("summary")?,
        created_at: decode_ts(&created_raw)?,
    })
}

impl MemoryStore for SqliteMemoryStore {
    fn append_message<'a>(&'a self, message: &'a Message) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;
            let inserted = sqlx::query(
                "INSERT OR IGNORE INTO conversation_messages
                     (chat_id, message_id, chat_name, sender_name, body, timestamp, is_from_me, is_group, has_media)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(&message.chat_id)
            .bind(&message.id)
            .bind(&message.chat_name)
            .bind(&message.sender_name)
            .bind(&message.body)
            .bind(message.timestamp)
            .bind(message.is_from_me)
            .bind(message.is_group)
            .bind(message.has_media)
            .execute(&mut *tx)
            .await?
            .rows_affected()
                > 0;

            if inserted {
                sqlx::query(
                    "DELETE FROM conversation_messages
                     WHERE chat_id = ?1
                       AND seq NOT IN (
                           SELECT seq FROM conversation_messages
                           WHERE chat_id = ?1
                           ORDER BY seq DESC
                           LIMIT ?2
                       )",
                )
                .bind(&message.chat_id)
                .bind(limit_i64(self.limits.conversation_window))
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok(inserted)
        })
    }

    fn conversation_window<'a>(
        &'a self,
        chat_id: &'a str,
        limit: usize,
    ) -> StoreFuture<'a, Vec<Message>> {
        Box::pin(async move {
            let limit = limit.min(self.limits.conversation_window);
            let rows = sqlx::query(&format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM conversation_messages
                 WHERE chat_id = $1
                 ORDER BY seq DESC
                 LIMIT $2"
            ))
            .bind(chat_id)
            .bind(limit_i64(limit))
            .fetch_all(&self.pool)
            .await?;

            let mut messages = rows
                .iter()
                .map(map_message_row)
                .collect::<Result<Vec<_>, _>>()?;
            messages.reverse();
            Ok(messages)
        })
    }

    fn has_history<'a>(&'a self, chat_id: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let (count,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM conversation_messages WHERE chat_id = $1",
            )
            .bind(chat_id)
            .fetch_one(&self.pool)
            .await?;
            Ok(count > 0)
        })
    }

    fn append_utterance<'a>(&'a self, utterance: &'a UserUtterance) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;
            sqlx::query("INSERT INTO user_utterances (text, spoken_at) VALUES ($1, $2)")
                .bind(&utterance.text)
                .bind(encode_ts(utterance.spoken_at))
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "DELETE FROM user_utterances
                 WHERE seq NOT IN (
                     SELECT seq FROM user_utterances ORDER BY seq DESC LIMIT $1
                 )",
            )
            .bind(limit_i64(self.limits.user_window))
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(())
        })
    }

    fn user_utterances<'a>(&'a self, limit: usize) -> StoreFuture<'a, Vec<UserUtterance>> {
        Box::pin(async move {
            let limit = limit.min(self.limits.user_window);
            let rows = sqlx::query(
                "SELECT text, spoken_at FROM user_utterances ORDER BY seq DESC LIMIT $1",
            )
            .bind(limit_i64(limit))
            .fetch_all(&self.pool)
            .await?;

            let mut utterances = rows
                .iter()
                .map(|row| {
                    let spoken_raw: String = row.try_get("spoken_at")?;
                    Ok(UserUtterance {
                        text: row.try_get("text")?,
                        spoken_at: decode_ts(&spoken_raw)?,
                    })
                })
                .collect::<Result<Vec<_>, StoreError>>()?;
            utterances.reverse();
            Ok(utterances)
        })
    }

    fn add_commitment<'a>(&'a self, commitment: &'a Commitment) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if commitment.start >= commitment.end {
                return Err(StoreError::Invariant(format!(
                    "commitment {} must end after it starts",
                    commitment.id
                )));
            }
            let participants = serde_json::to_string(&commitment.participants)
                .map_err(|e| StoreError::Query(e.to_string()))?;
            sqlx::query(
                "INSERT INTO commitments (id, description, start_at, end_at, participants)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT(id) DO UPDATE SET
                     description = excluded.description,
                     start_at = excluded.start_at,
                     end_at = excluded.end_at,
                     participants = excluded.participants",
            )
            .bind(&commitment.id)
            .bind(&commitment.description)
            .bind(encode_ts(commitment.start))
            .bind(encode_ts(commitment.end))
            .bind(participants)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn remove_commitment<'a>(&'a self, id: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM commitments WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn list_commitments<'a>(&'a self) -> StoreFuture<'a, Vec<Commitment>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT id, description, start_at, end_at, participants
                 FROM commitments
                 ORDER BY start_at",
            )
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(map_commitment_row).collect()
        })
    }

    fn commitments_between<'a>(
        &'a self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreFuture<'a, Vec<Commitment>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT id, description, start_at, end_at, participants
                 FROM commitments
                 WHERE start_at < $1 AND end_at > $2
                 ORDER BY start_at",
            )
            .bind(encode_ts(to))
            .bind(encode_ts(from))
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(map_commitment_row).collect()
        })
    }

    fn claim_dispatch<'a>(&'a self, message_id: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO dispatch_claims (message_id, claimed_at) VALUES ($1, $2)",
            )
            .bind(message_id)
            .bind(encode_ts(Utc::now()))
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn record_dispatch<'a>(&'a self, record: &'a DispatchRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO dispatch_log (message_id, chat_id, action, reason, sent_text, recorded_at)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT(message_id) DO UPDATE SET
                     action = excluded.action,
                     reason = excluded.reason,
                     sent_text = excluded.sent_text,
                     recorded_at = excluded.recorded_at",
            )
            .bind(&record.message_id)
            .bind(&record.chat_id)
            .bind(record.action.to_string())
            .bind(&record.reason)
            .bind(record.sent_text.as_deref())
            .bind(encode_ts(record.recorded_at))
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn dispatch_for<'a>(
        &'a self,
        message_id: &'a str,
    ) -> StoreFuture<'a, Option<DispatchRecord>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT message_id, chat_id, action, reason, sent_text, recorded_at
                 FROM dispatch_log
                 WHERE message_id = $1",
            )
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
            row.map(|r| map_dispatch_row(&r)).transpose()
        })
    }

    fn recent_dispatches<'a>(&'a self, limit: usize) -> StoreFuture<'a, Vec<DispatchRecord>> {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT message_id, chat_id, action, reason, sent_text, recorded_at
                 FROM dispatch_log
                 ORDER BY recorded_at DESC
                 LIMIT $1",
            )
            .bind(limit_i64(limit))
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(map_dispatch_row).collect()
        })
    }

    fn add_pending_reply<'a>(&'a self, pending: &'a PendingReply) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            sqlx::query(
                "INSERT OR REPLACE INTO pending_replies
                     (message_id, chat_id, chat_name, sender_name, body, summary, created_at, resolved)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, 0)",
            )
            .bind(&pending.message_id)
            .bind(&pending.chat_id)
            .bind(&pending.chat_name)
            .bind(&pending.sender_name)
            .bind(&pending.body)
            .bind(pending.summary.as_deref())
            .bind(encode_ts(pending.created_at))
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn latest_pending_reply<'a>(
        &'a self,
        chat_id: Option<&'a str>,
    ) -> StoreFuture<'a, Option<PendingReply>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT message_id, chat_id, chat_name, sender_name, body, summary, created_at
                 FROM pending_replies
                 WHERE resolved = 0 AND ($1 IS NULL OR chat_id = $1)
                 ORDER BY created_at DESC
                 LIMIT 1",
            )
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;
            row.map(|r| map_pending_row(&r)).transpose()
        })
    }

    fn resolve_pending_replies<'a>(&'a self, chat_id: &'a str) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE pending_replies SET resolved = 1 WHERE chat_id = $1 AND resolved = 0",
            )
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
            Ok(usize::try_from(result.rows_affected()).unwrap_or(usize::MAX))
        })
    }

    fn search_messages<'a>(
        &'a self,
        query: &'a str,
        limit: usize,
    ) -> StoreFuture<'a, Vec<Message>> {
        Box::pin(async move {
            let rows = sqlx::query(&format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM conversation_messages
                 WHERE body LIKE $1 ESCAPE '\\'
                 ORDER BY seq DESC
                 LIMIT $2"
            ))
            .bind(escape_like(query.trim()))
            .bind(limit_i64(limit))
            .fetch_all(&self.pool)
            .await?;
            rows.iter().map(map_message_row).collect()
        })
    }

    fn health_check<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .is_ok()
        })
    }
}
