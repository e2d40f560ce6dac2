//! Redis-based ephemeral store implementation.
//!
//! One Redis database backs every namespace. Keys are `{prefix}{key}` where
//! the prefix comes from [`Namespace::prefix`]; values are opaque bytes.
//!
//! # Commands
//!
//! - `save`: `SET key value EX ttl`
//! - `get`: `GET key`
//! - `take`: `GETDEL key` (single-use guarantee)
//! - `delete`: `DEL key`
//! - `refresh_ttl`: `EXPIRE key ttl`
//! - `get_and_refresh`: `GETEX key EX ttl` (sliding expiry in one round-trip)
//!
//! # Example
//!
//! ```no_run
//! use passkey_gate_auth::stores::RedisEphemeralStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisEphemeralStore::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::providers::ephemeral_store::{ttl_seconds, EphemeralStore, Namespace};
use chrono::Duration;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// `Redis`-backed [`EphemeralStore`].
///
/// Cloning is cheap; all clones share the same `ConnectionManager`, which
/// reconnects on its own after a dropped connection.
#[derive(Clone)]
pub struct RedisEphemeralStore {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisEphemeralStore {
    /// Connect to `Redis`.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - `Redis` connection URL (e.g., "<redis://127.0.0.1:6379>")
    ///
    /// # Errors
    ///
    /// Returns error if connection to `Redis` fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| AuthError::StorageError(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            AuthError::StorageError(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self { conn_manager })
    }

    /// Round-trip a `PING`, used by readiness checks.
    ///
    /// # Errors
    ///
    /// Returns error if `Redis` does not answer.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::StorageError(format!("Redis ping failed: {e}")))?;
        Ok(())
    }
}

impl EphemeralStore for RedisEphemeralStore {
    async fn save(
        &self,
        namespace: Namespace,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let ttl_seconds = ttl_seconds(ttl);

        let _: () = conn
            .set_ex(namespace.key(key), value, ttl_seconds)
            .await
            .map_err(|e| AuthError::StorageError(format!("Failed to save {namespace:?}: {e}")))?;

        tracing::debug!(?namespace, ttl_seconds, "Saved ephemeral record");
        Ok(())
    }

    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn_manager.clone();

        conn.get(namespace.key(key))
            .await
            .map_err(|e| AuthError::StorageError(format!("Failed to read {namespace:?}: {e}")))
    }

    async fn take(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn_manager.clone();

        // GETDEL: get + delete in one operation
        let value: Option<Vec<u8>> = conn
            .get_del(namespace.key(key))
            .await
            .map_err(|e| AuthError::StorageError(format!("Failed to take {namespace:?}: {e}")))?;

        if value.is_some() {
            tracing::debug!(?namespace, "Consumed ephemeral record (single-use)");
        }

        Ok(value)
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let _: () = conn
            .del(namespace.key(key))
            .await
            .map_err(|e| AuthError::StorageError(format!("Failed to delete {namespace:?}: {e}")))?;

        Ok(())
    }

    async fn refresh_ttl(&self, namespace: Namespace, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn_manager.clone();

        let refreshed: bool = redis::cmd("EXPIRE")
            .arg(namespace.key(key))
            .arg(ttl_seconds(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::StorageError(format!("Failed to refresh {namespace:?}: {e}")))?;

        Ok(refreshed)
    }

    async fn get_and_refresh(
        &self,
        namespace: Namespace,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn_manager.clone();

        redis::cmd("GETEX")
            .arg(namespace.key(key))
            .arg("EX")
            .arg(ttl_seconds(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::StorageError(format!("Failed to refresh {namespace:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    async fn test_take_is_single_use() {
        let store = RedisEphemeralStore::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to create store");

        store
            .save(Namespace::Ceremony, "take-once", b"state".to_vec(), Duration::minutes(5))
            .await
            .expect("Failed to save");

        let first = store.take(Namespace::Ceremony, "take-once").await.unwrap();
        let second = store.take(Namespace::Ceremony, "take-once").await.unwrap();

        assert_eq!(first.as_deref(), Some(b"state".as_slice()));
        assert!(second.is_none());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    async fn test_concurrent_take() {
        let store = RedisEphemeralStore::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to create store");

        store
            .save(Namespace::Ceremony, "race", b"x".to_vec(), Duration::minutes(5))
            .await
            .expect("Failed to save");

        let mut handles = vec![];
        for _ in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.take(Namespace::Ceremony, "race").await.unwrap()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1, "GETDEL must hand the record to exactly one caller");
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    async fn test_get_and_refresh_extends_ttl() {
        let store = RedisEphemeralStore::new("redis://127.0.0.1:6379")
            .await
            .expect("Failed to create store");

        store
            .save(Namespace::AuthSession, "slide", b"s".to_vec(), Duration::seconds(2))
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        let value = store
            .get_and_refresh(Namespace::AuthSession, "slide", Duration::seconds(2))
            .await
            .unwrap();
        assert!(value.is_some());

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        let value = store.get(Namespace::AuthSession, "slide").await.unwrap();
        assert!(value.is_some(), "refreshed session should outlive its first TTL");

        store.delete(Namespace::AuthSession, "slide").await.unwrap();
        assert!(!store
            .refresh_ttl(Namespace::AuthSession, "slide", Duration::seconds(2))
            .await
            .unwrap());
    }
}
