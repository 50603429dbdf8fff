//! Background sweep of expired `kv_entries` rows, grounded in the teacher's
//! `storage::retention::retention_loop`. Reads already treat expired rows as
//! absent; this loop just keeps the table from growing unbounded between
//! reads on keys nobody asks for again (e.g. an unconsumed, never-polled
//! share token).

use deadpool_sqlite::Pool;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time;

pub async fn reap_loop(pool: Pool, interval_secs: u64) {
    let mut interval = time::interval(Duration::from_secs(interval_secs));
    loop {
        interval.tick().await;
        match reap_once(&pool).await {
            Ok((kv_deleted, coord_deleted)) => {
                if kv_deleted > 0 || coord_deleted > 0 {
                    tracing::info!(kv_deleted, coord_deleted, "reaped expired entries");
                }
            }
            Err(e) => tracing::error!(error = %e, "kv reap failed"),
        }
    }
}

async fn reap_once(pool: &Pool) -> Result<(usize, usize), Box<dyn std::error::Error + Send + Sync>> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64;

    let conn = pool.get().await?;
    let result = conn
        .interact(move |conn| {
            let kv_deleted = conn.execute(
                "DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                rusqlite::params![now],
            )?;
            let coord_deleted = conn.execute(
                "DELETE FROM token_coord WHERE expires_at <= ?1",
                rusqlite::params![now],
            )?;
            Ok::<_, rusqlite::Error>((kv_deleted, coord_deleted))
        })
        .await
        .map_err(|e| format!("interact error: {e}"))??;

    Ok(result)
}
