use rusqlite::Connection;

const MIGRATION_001: &str = "
CREATE TABLE IF NOT EXISTS kv_entries (
    namespace   TEXT NOT NULL,
    key         TEXT NOT NULL,
    value       TEXT NOT NULL,
    expires_at  INTEGER,
    PRIMARY KEY (namespace, key)
);
CREATE INDEX IF NOT EXISTS idx_kv_expiry ON kv_entries(expires_at) WHERE expires_at IS NOT NULL;
";

const MIGRATION_002: &str = "
CREATE TABLE IF NOT EXISTS token_coord (
    token       TEXT PRIMARY KEY,
    consumed    INTEGER NOT NULL DEFAULT 0,
    recipient   TEXT NOT NULL,
    expires_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_token_coord_expiry ON token_coord(expires_at);
";

pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id      INTEGER PRIMARY KEY,
            name    TEXT NOT NULL,
            applied INTEGER NOT NULL
        );",
    )?;

    let migrations: &[(i64, &str, &str)] = &[
        (1, "001_kv_entries", MIGRATION_001),
        (2, "002_token_coord", MIGRATION_002),
    ];

    for &(id, name, sql) in migrations {
        let applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !applied {
            tracing::info!(migration = name, "applying migration");
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO _migrations (id, name, applied) VALUES (?1, ?2, unixepoch())",
                rusqlite::params![id, name],
            )?;
        }
    }

    Ok(())
}
