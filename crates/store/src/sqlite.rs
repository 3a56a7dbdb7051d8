//! SQLite-backed TTL store using sqlx.
//!
//! Every operation is one statement, which is what makes the conditional
//! writes (`set_if_absent`, `delete_if_value`) atomic across processes
//! sharing the database file.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use {
    async_trait::async_trait,
    serde_json::Value,
    sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions},
};

use crate::{Result, kv::KvStore};

pub struct SqliteKv {
    pool: SqlitePool,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn expiry_ms(ttl: Duration) -> i64 {
    now_ms().saturating_add(ttl.as_millis() as i64)
}

/// Escape `%` and `_` so a key prefix is matched literally by LIKE.
fn like_prefix(prefix: &str) -> String {
    let escaped = prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("{escaped}%")
}

impl SqliteKv {
    /// Connect with a fresh pool and run migrations.
    ///
    /// For shared pools (one database per deployment), run
    /// [`crate::run_migrations`] at startup and use [`SqliteKv::with_pool`].
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        crate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool (migrations must already be run).
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvStore for SqliteKv {
    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        let data = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT INTO kv_entries (key, value, expires_at_ms) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               expires_at_ms = excluded.expires_at_ms",
        )
        .bind(key)
        .bind(&data)
        .bind(expiry_ms(ttl))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query_scalar::<_, String>(
            "SELECT value FROM kv_entries WHERE key = ? AND expires_at_ms > ?",
        )
        .bind(key)
        .bind(now_ms())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE key = ? AND expires_at_ms > ?")
            .bind(key)
            .bind(now_ms())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE key LIKE ? ESCAPE '\\'")
            .bind(like_prefix(prefix))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT key FROM kv_entries WHERE key LIKE ? ESCAPE '\\' AND expires_at_ms > ?
             ORDER BY key",
        )
        .bind(like_prefix(prefix))
        .bind(now_ms())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.get("key")).collect())
    }

    async fn set_if_absent(&self, key: &str, value: &Value, ttl: Duration) -> Result<bool> {
        let data = serde_json::to_string(value)?;
        // The conditional upsert only replaces an expired entry, so the
        // claim is race-free: exactly one concurrent caller sees a row
        // inserted or updated.
        let result = sqlx::query(
            "INSERT INTO kv_entries (key, value, expires_at_ms) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               expires_at_ms = excluded.expires_at_ms
             WHERE kv_entries.expires_at_ms <= ?",
        )
        .bind(key)
        .bind(&data)
        .bind(expiry_ms(ttl))
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_if_value(&self, key: &str, value: &Value) -> Result<bool> {
        let data = serde_json::to_string(value)?;
        let result = sqlx::query(
            "DELETE FROM kv_entries WHERE key = ? AND value = ? AND expires_at_ms > ?",
        )
        .bind(key)
        .bind(&data)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE expires_at_ms <= ?")
            .bind(now_ms())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
