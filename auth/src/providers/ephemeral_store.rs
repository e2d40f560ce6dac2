//! Ephemeral TTL-keyed state storage.
//!
//! Four independent namespaces share one backing store. Each namespace has its
//! own key prefix so keys can never collide across namespaces:
//!
//! | Namespace | Prefix | Lifetime | Access pattern |
//! |---|---|---|---|
//! | Verification | `verify:` | 10 min | take, restored on mismatch |
//! | Ceremony | `webauthn:session:` | 5 min | take (read + delete) |
//! | Registration | `webauthn:registration:` | 5 min | take (read + delete) |
//! | `AuthSession` | `auth:session:` | sliding | get-and-refresh |
//!
//! # Implementation Notes
//!
//! **Production** (`Redis`):
//! ```ignore
//! // save:            SET key value EX ttl_seconds
//! // take:            GETDEL key
//! // get_and_refresh: GETEX key EX ttl_seconds
//! ```
//!
//! The store never retries. Unavailability surfaces as
//! [`AuthError::StorageError`](crate::AuthError::StorageError).

use crate::error::Result;
use chrono::Duration;

/// Storage class of an ephemeral record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Email verification codes.
    Verification,
    /// `WebAuthn` challenge sessions.
    Ceremony,
    /// In-progress credential-as-identity registrations.
    Registration,
    /// Authenticated sessions.
    AuthSession,
}

impl Namespace {
    /// Key prefix for this namespace.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Verification => "verify:",
            Self::Ceremony => "webauthn:session:",
            Self::Registration => "webauthn:registration:",
            Self::AuthSession => "auth:session:",
        }
    }

    /// Fully qualified key.
    #[must_use]
    pub fn key(self, key: &str) -> String {
        format!("{}{key}", self.prefix())
    }
}

/// TTL-keyed key-value store.
///
/// Implementations must be safe for concurrent use; callers share one
/// instance across all requests.
pub trait EphemeralStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value and TTL.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    fn save(
        &self,
        namespace: Namespace,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Read a value without touching its TTL.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable. A missing or expired key is
    /// `Ok(None)`.
    fn get(
        &self,
        namespace: Namespace,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Atomically read and delete a value.
    ///
    /// Of several concurrent callers for the same key at most one observes
    /// `Some`.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    fn take(
        &self,
        namespace: Namespace,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Delete a value. Deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    fn delete(
        &self,
        namespace: Namespace,
        key: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Reset the TTL of an existing key.
    ///
    /// Returns `false` when the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    fn refresh_ttl(
        &self,
        namespace: Namespace,
        key: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Read a value and reset its TTL in one atomic step.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    fn get_and_refresh(
        &self,
        namespace: Namespace,
        key: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;
}

/// Whole seconds of a TTL, at least one.
#[must_use]
pub fn ttl_seconds(ttl: Duration) -> u64 {
    u64::try_from(ttl.num_seconds()).unwrap_or(0).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_are_distinct() {
        let all = [
            Namespace::Verification,
            Namespace::Ceremony,
            Namespace::Registration,
            Namespace::AuthSession,
        ];
        for a in all {
            for b in all {
                if a != b {
                    assert!(!a.prefix().starts_with(b.prefix()));
                }
            }
        }
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(Namespace::Verification.key("a@b.c"), "verify:a@b.c");
        assert_eq!(Namespace::AuthSession.key("tok"), "auth:session:tok");
    }

    #[test]
    fn test_ttl_seconds() {
        assert_eq!(ttl_seconds(Duration::minutes(5)), 300);
        assert_eq!(ttl_seconds(Duration::zero()), 1);
        assert_eq!(ttl_seconds(Duration::seconds(-3)), 1);
    }
}
