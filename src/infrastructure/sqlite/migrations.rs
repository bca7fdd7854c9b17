use crate::domain::error::DomainError;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<(), DomainError> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS providers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            is_active INTEGER NOT NULL DEFAULT 1,
            last_event_sync TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            provider_id INTEGER NOT NULL REFERENCES providers(id),
            external_id TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            subtitle TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT '',
            mutually_exclusive INTEGER NOT NULL DEFAULT 0,
            series_ticker TEXT NOT NULL DEFAULT '',
            strike_period TEXT NOT NULL DEFAULT '',
            expiration_time TEXT,
            closest_market_close_time TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (provider_id, external_id)
        );

        CREATE TABLE IF NOT EXISTS markets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            provider_id INTEGER NOT NULL REFERENCES providers(id),
            external_id TEXT NOT NULL,
            ticker TEXT NOT NULL,
            event_ticker TEXT NOT NULL DEFAULT '',
            title TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            yes_sub_title TEXT NOT NULL DEFAULT '',
            no_sub_title TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'active',
            close_time TEXT,
            last_data_update TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (provider_id, external_id)
        );

        CREATE TABLE IF NOT EXISTS market_vectors (
            row_id INTEGER PRIMARY KEY,
            dim INTEGER NOT NULL,
            vector BLOB NOT NULL
        );

        CREATE TABLE IF NOT EXISTS cache_entries (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_events_closest_close ON events(closest_market_close_time);
        CREATE INDEX IF NOT EXISTS idx_markets_ticker ON markets(ticker);
        CREATE INDEX IF NOT EXISTS idx_markets_event_ticker ON markets(event_ticker);
        CREATE INDEX IF NOT EXISTS idx_markets_status ON markets(status);
        CREATE INDEX IF NOT EXISTS idx_cache_expires ON cache_entries(expires_at);
        ",
    )
    .map_err(|e| DomainError::Database(format!("Migration failed: {e}")))
}

/// Inserts the providers this build knows about if they are missing.
pub fn seed_providers(conn: &Connection, names: &[&str]) -> Result<usize, DomainError> {
    let now = super::fmt_ts(&chrono::Utc::now());
    let mut seeded = 0;
    for name in names {
        seeded += conn
            .execute(
                "INSERT OR IGNORE INTO providers (name, is_active, created_at, updated_at) VALUES (?1, 1, ?2, ?2)",
                rusqlite::params![name, now],
            )
            .map_err(|e| DomainError::Database(format!("Failed to seed provider {name}: {e}")))?;
    }
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
    }

    #[test]
    fn test_seed_providers_once() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(seed_providers(&conn, &["kalshi"]).unwrap(), 1);
        assert_eq!(seed_providers(&conn, &["kalshi"]).unwrap(), 0);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM providers", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
