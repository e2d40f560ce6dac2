//! In-memory ephemeral store for testing.

use crate::error::{AuthError, Result};
use crate::providers::ephemeral_store::{ttl_seconds, EphemeralStore, Namespace};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// In-memory [`EphemeralStore`].
///
/// Expiry runs on the tokio clock, so tests using
/// `#[tokio::test(start_paused = true)]` can move time with
/// `tokio::time::advance`. TTLs are rounded to whole seconds like Redis does.
///
/// **WARNING**: Do NOT use in production. This is for testing only!
#[derive(Clone, Default)]
pub struct MemoryEphemeralStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryEphemeralStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a storage error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of live keys in a namespace.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    #[must_use]
    pub fn live_keys(&self, namespace: Namespace) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, entry)| key.starts_with(namespace.prefix()) && entry.expires_at > now)
            .count()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::StorageError("store unavailable".into()));
        }
        Ok(())
    }

    fn deadline(ttl: Duration) -> Instant {
        Instant::now() + std::time::Duration::from_secs(ttl_seconds(ttl))
    }

    /// Run `f` with the map locked, after dropping `key` if it has expired.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    fn with_live<T>(&self, key: &str, f: impl FnOnce(&mut HashMap<String, Entry>) -> T) -> T {
        let mut entries = self.entries.lock().unwrap();
        if entries
            .get(key)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(key);
        }
        f(&mut entries)
    }
}

impl EphemeralStore for MemoryEphemeralStore {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn save(
        &self,
        namespace: Namespace,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<()> {
        self.check_available()?;
        self.entries.lock().unwrap().insert(
            namespace.key(key),
            Entry {
                value,
                expires_at: Self::deadline(ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_available()?;
        let key = namespace.key(key);
        Ok(self.with_live(&key, |entries| entries.get(&key).map(|e| e.value.clone())))
    }

    async fn take(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_available()?;
        let key = namespace.key(key);
        Ok(self.with_live(&key, |entries| entries.remove(&key).map(|e| e.value)))
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn delete(&self, namespace: Namespace, key: &str) -> Result<()> {
        self.check_available()?;
        self.entries.lock().unwrap().remove(&namespace.key(key));
        Ok(())
    }

    async fn refresh_ttl(&self, namespace: Namespace, key: &str, ttl: Duration) -> Result<bool> {
        self.check_available()?;
        let key = namespace.key(key);
        Ok(self.with_live(&key, |entries| {
            entries
                .get_mut(&key)
                .map(|entry| entry.expires_at = Self::deadline(ttl))
                .is_some()
        }))
    }

    async fn get_and_refresh(
        &self,
        namespace: Namespace,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<Vec<u8>>> {
        self.check_available()?;
        let key = namespace.key(key);
        Ok(self.with_live(&key, |entries| {
            entries.get_mut(&key).map(|entry| {
                entry.expires_at = Self::deadline(ttl);
                entry.value.clone()
            })
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = MemoryEphemeralStore::new();
        store
            .save(Namespace::Verification, "k", b"v".to_vec(), Duration::minutes(10))
            .await
            .unwrap();

        tokio::time::advance(std::time::Duration::from_secs(599)).await;
        assert!(store.get(Namespace::Verification, "k").await.unwrap().is_some());

        tokio::time::advance(std::time::Duration::from_secs(2)).await;
        assert!(store.get(Namespace::Verification, "k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_and_refresh_slides() {
        let store = MemoryEphemeralStore::new();
        let ttl = Duration::seconds(100);
        store
            .save(Namespace::AuthSession, "t", b"s".to_vec(), ttl)
            .await
            .unwrap();

        tokio::time::advance(std::time::Duration::from_secs(90)).await;
        assert!(store
            .get_and_refresh(Namespace::AuthSession, "t", ttl)
            .await
            .unwrap()
            .is_some());

        tokio::time::advance(std::time::Duration::from_secs(90)).await;
        assert!(store.get(Namespace::AuthSession, "t").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_take_removes() {
        let store = MemoryEphemeralStore::new();
        store
            .save(Namespace::Ceremony, "c", b"x".to_vec(), Duration::minutes(5))
            .await
            .unwrap();

        assert!(store.take(Namespace::Ceremony, "c").await.unwrap().is_some());
        assert!(store.take(Namespace::Ceremony, "c").await.unwrap().is_none());
        assert_eq!(store.live_keys(Namespace::Ceremony), 0);
    }

    #[tokio::test]
    async fn test_refresh_missing_key() {
        let store = MemoryEphemeralStore::new();
        let refreshed = store
            .refresh_ttl(Namespace::AuthSession, "nope", Duration::minutes(1))
            .await
            .unwrap();
        assert!(!refreshed);
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = MemoryEphemeralStore::new();
        store.set_unavailable(true);
        let result = store.get(Namespace::AuthSession, "t").await;
        assert!(matches!(result, Err(AuthError::StorageError(_))));
    }
}
