//! The generic, namespaced, TTL-aware key-value abstraction that UKV, SKV
//! and IKV are all realized on top of (§2, §9 "fallback store aliasing").
//!
//! Backed by a single SQLite table (`kv_entries`) behind a deadpool-sqlite
//! pool. A row is "alive" iff `expires_at` is NULL or in the future; reads
//! treat an expired row as absent and opportunistically delete it, which is
//! how the "TTL race" the spec calls out (§4.2, §4.3) is realized in
//! practice. [`reap_loop`] additionally sweeps expired rows on an interval
//! so storage doesn't grow unbounded between reads.

pub mod migrations;
pub mod reaper;

use crate::error::{AppError, AppResult};
use deadpool_sqlite::Pool;
use rusqlite::{params, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Clone)]
pub struct Kv {
    pool: Pool,
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

impl Kv {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Store `value` under `namespace`/`key`. `ttl: None` means no expiry
    /// (only the user directory uses this).
    pub async fn put<T: Serialize + Send + 'static>(
        &self,
        namespace: &'static str,
        key: String,
        value: &T,
        ttl: Option<Duration>,
    ) -> AppResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(format!("serialize kv value: {e}")))?;
        let expires_at = ttl.map(|d| now_millis() + d.as_millis() as i64);

        let conn = self.pool.get().await.map_err(|e| AppError::Internal(format!("pool error: {e}")))?;
        conn.interact(move |conn| {
            conn.execute(
                "INSERT INTO kv_entries (namespace, key, value, expires_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (namespace, key)
                 DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
                params![namespace, key, json, expires_at],
            )
        })
        .await??;
        Ok(())
    }

    /// Fetch and deserialize a live entry, or `None` if absent/expired.
    pub async fn get<T: DeserializeOwned + Send + 'static>(
        &self,
        namespace: &'static str,
        key: String,
    ) -> AppResult<Option<T>> {
        let now = now_millis();
        let lookup_key = key.clone();
        let conn = self.pool.get().await.map_err(|e| AppError::Internal(format!("pool error: {e}")))?;
        let row: Option<(String, Option<i64>)> = conn
            .interact(move |conn| {
                conn.query_row(
                    "SELECT value, expires_at FROM kv_entries WHERE namespace = ?1 AND key = ?2",
                    params![namespace, lookup_key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
            })
            .await??;

        let Some((value, expires_at)) = row else {
            return Ok(None);
        };

        if let Some(exp) = expires_at {
            if exp <= now {
                // Expired between the listing and this read (or just expired
                // since we last looked). Clean up lazily and report absent.
                let _ = self.delete(namespace, key).await;
                return Ok(None);
            }
        }

        let parsed = serde_json::from_str(&value)
            .map_err(|e| AppError::Internal(format!("deserialize kv value: {e}")))?;
        Ok(Some(parsed))
    }

    pub async fn delete(&self, namespace: &'static str, key: String) -> AppResult<()> {
        let conn = self.pool.get().await.map_err(|e| AppError::Internal(format!("pool error: {e}")))?;
        conn.interact(move |conn| {
            conn.execute(
                "DELETE FROM kv_entries WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )
        })
        .await??;
        Ok(())
    }

    /// List up to `limit` live entries whose key starts with `prefix`,
    /// ordered by key. Skips (and lazily reaps) expired rows.
    pub async fn list_by_prefix<T: DeserializeOwned + Send + 'static>(
        &self,
        namespace: &'static str,
        prefix: String,
        limit: usize,
    ) -> AppResult<Vec<(String, T)>> {
        let now = now_millis();
        // LIKE-escape the prefix so literal `%`/`_` in tokens/usernames don't
        // act as wildcards.
        let escaped = prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let like_pattern = format!("{escaped}%");

        let conn = self.pool.get().await.map_err(|e| AppError::Internal(format!("pool error: {e}")))?;
        let rows: Vec<(String, String, Option<i64>)> = conn
            .interact(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT key, value, expires_at FROM kv_entries
                     WHERE namespace = ?1 AND key LIKE ?2 ESCAPE '\\'
                     ORDER BY key LIMIT ?3",
                )?;
                let rows = stmt
                    .query_map(params![namespace, like_pattern, limit as i64], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok::<_, rusqlite::Error>(rows)
            })
            .await??;

        let mut out = Vec::with_capacity(rows.len());
        for (key, value, expires_at) in rows {
            if let Some(exp) = expires_at {
                if exp <= now {
                    let _ = self.delete(namespace, key).await;
                    continue;
                }
            }
            match serde_json::from_str::<T>(&value) {
                Ok(parsed) => out.push((key, parsed)),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping undeserializable kv row");
                }
            }
        }
        Ok(out)
    }
}
