//! Per-token serialization of the share channel's `init -> status -> consume`
//! transitions (§4.2, §5).
//!
//! ```text
//! INIT ──init──▶ LIVE ──consume──▶ CONSUMED (absorbing)
//!               │                        │
//!               └── TTL ──▶ GONE ◀── TTL ┘
//! ```
//!
//! Realized as design note 9's strategy (b): a single-key conditional write
//! against a store with linearizable single-key operations. SQLite
//! serializes writers against one database file, so `UPDATE token_coord SET
//! consumed = 1 WHERE token = ?1 AND consumed = 0` is the CAS — exactly one
//! concurrent caller observes `rows_affected == 1`, the rest observe 0 and
//! are told the token is already gone. No additional in-process lock is
//! needed.

use crate::error::{AppError, AppResult};
use deadpool_sqlite::Pool;
use rusqlite::{params, OptionalExtension};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub enum TokenStatus {
    Live { recipient: String },
    Consumed,
    Unknown,
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

#[derive(Clone)]
pub struct TokenCoordinator {
    pool: Pool,
}

impl TokenCoordinator {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> AppResult<deadpool_sqlite::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| AppError::Internal(format!("pool error: {e}")))
    }

    /// Initialize coordinator state for a freshly minted token.
    pub async fn init(&self, token: String, recipient: String, ttl: Duration) -> AppResult<()> {
        let expires_at = now_millis() + ttl.as_millis() as i64;
        let conn = self.conn().await?;
        conn.interact(move |conn| {
            conn.execute(
                "INSERT INTO token_coord (token, consumed, recipient, expires_at)
                 VALUES (?1, 0, ?2, ?3)",
                params![token, recipient, expires_at],
            )
        })
        .await??;
        Ok(())
    }

    /// LIVE is legal only before expiry and before consumption; CONSUMED and
    /// GONE (expired or never existed) are externally indistinguishable.
    pub async fn status(&self, token: String) -> AppResult<TokenStatus> {
        let now = now_millis();
        let conn = self.conn().await?;
        let row: Option<(i64, String, i64)> = conn
            .interact(move |conn| {
                conn.query_row(
                    "SELECT consumed, recipient, expires_at FROM token_coord WHERE token = ?1",
                    params![token],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
            })
            .await??;

        let Some((consumed, recipient, expires_at)) = row else {
            return Ok(TokenStatus::Unknown);
        };

        if consumed != 0 {
            return Ok(TokenStatus::Consumed);
        }
        if expires_at <= now {
            return Ok(TokenStatus::Unknown);
        }
        Ok(TokenStatus::Live { recipient })
    }

    /// Atomic `consumed: false -> true`. Returns `true` iff this call won
    /// the race; `false` means the token was already consumed, expired, or
    /// never existed.
    pub async fn consume(&self, token: String) -> AppResult<bool> {
        let now = now_millis();
        let conn = self.conn().await?;
        let rows = conn
            .interact(move |conn| {
                conn.execute(
                    "UPDATE token_coord SET consumed = 1
                     WHERE token = ?1 AND consumed = 0 AND expires_at > ?2",
                    params![token, now],
                )
            })
            .await??;
        Ok(rows == 1)
    }
}
