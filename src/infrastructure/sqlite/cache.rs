use super::{lock, SharedConnection};
use crate::domain::error::DomainError;
use crate::domain::ports::cache::Cache;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::time::Duration;

/// TTL cache in the `cache_entries` table. Expired rows are treated as
/// misses and removed on read.
pub struct SqliteCache {
    conn: SharedConnection,
}

impl SqliteCache {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn get_sync(&self, key: &str) -> Result<Option<String>, DomainError> {
        let conn = lock(&self.conn)?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT value, expires_at FROM cache_entries WHERE key = ?1",
                params![key],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .map_err(|e| DomainError::Cache(format!("get {key}: {e}")))?;

        match row {
            Some((value, expires_at)) if expires_at > Self::now_ms() => Ok(Some(value)),
            Some(_) => {
                conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])
                    .map_err(|e| DomainError::Cache(format!("evict {key}: {e}")))?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set_sync(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let expires_at = Self::now_ms().saturating_add(ttl.as_millis().min(i64::MAX as u128) as i64);
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            params![key, value, expires_at],
        )
        .map_err(|e| DomainError::Cache(format!("set {key}: {e}")))?;
        Ok(())
    }

    fn delete_sync(&self, key: &str) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])
            .map_err(|e| DomainError::Cache(format!("delete {key}: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl Cache for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        self.get_sync(key)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        self.set_sync(key, value, ttl)
    }

    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        self.delete_sync(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::sqlite::open;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = SqliteCache::new(open(":memory:").unwrap());
        cache.set("rel:A:B", "{}", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("rel:A:B").await.unwrap().as_deref(), Some("{}"));
        assert_eq!(cache.get("rel:B:A").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss_and_evicted() {
        let conn = open(":memory:").unwrap();
        let cache = SqliteCache::new(conn.clone());
        cache.set("k", "v", Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);

        let remaining: i64 = lock(&conn)
            .unwrap()
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_set_overwrites_and_delete_removes() {
        let cache = SqliteCache::new(open(":memory:").unwrap());
        cache.set("k", "old", Duration::from_secs(60)).await.unwrap();
        cache.set("k", "new", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("new"));
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
