//! Typed records over the ephemeral store.
//!
//! [`StateStore`] owns the JSON encoding of every record kind and the
//! namespace it lives in. A record that fails to decode reads as missing.

use crate::error::Result;
use crate::principal::SessionClaims;
use crate::providers::{EphemeralStore, Namespace};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pending email verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// 6-digit code.
    pub code: String,
    /// When the code was issued.
    pub issued_at: DateTime<Utc>,
}

/// What a challenge session will be finished as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CeremonyPurpose {
    /// Credential registration for an email-verified user.
    Registration {
        /// User the credential will be bound to.
        user_id: Uuid,
    },
    /// Discoverable login.
    Login,
}

/// Engine state between a begin step and its finish step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeSession {
    /// Ceremony kind.
    pub purpose: CeremonyPurpose,
    /// Engine state.
    pub state: serde_json::Value,
}

/// Credential-as-identity registration in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationSession {
    /// Self-assigned user handle.
    pub handle: Uuid,
    /// Display name chosen at begin.
    pub display_name: String,
    /// Engine state.
    pub state: serde_json::Value,
}

/// Authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSessionRecord {
    /// Identity the session was issued to.
    pub claims: SessionClaims,
    /// Issue time.
    pub created_at: DateTime<Utc>,
}

/// Typed facade over an [`EphemeralStore`].
#[derive(Clone)]
pub struct StateStore<S> {
    store: S,
}

impl<S: EphemeralStore> StateStore<S> {
    /// Wrap a raw store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Underlying store.
    pub const fn inner(&self) -> &S {
        &self.store
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Verification codes (keyed by normalized email)
    // ═══════════════════════════════════════════════════════════════════════

    /// Store a code, overwriting any pending one for the same email.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    pub async fn save_code(&self, email: &str, code: &str, ttl: Duration) -> Result<()> {
        let record = VerificationRecord {
            code: code.to_string(),
            issued_at: Utc::now(),
        };
        self.put(Namespace::Verification, email, &record, ttl).await
    }

    /// Remove and return the pending code for an email.
    ///
    /// Of several concurrent callers at most one receives the record.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    pub async fn take_code(&self, email: &str) -> Result<Option<VerificationRecord>> {
        let bytes = self.store.take(Namespace::Verification, email).await?;
        Ok(decode(Namespace::Verification, bytes))
    }

    /// Put back a taken code for what is left of its lifetime.
    ///
    /// Nothing is stored once `code_ttl` has elapsed since issue.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    pub async fn restore_code(
        &self,
        email: &str,
        record: &VerificationRecord,
        code_ttl: Duration,
    ) -> Result<()> {
        let remaining = record.issued_at + code_ttl - Utc::now();
        if remaining <= Duration::zero() {
            return Ok(());
        }
        self.put(Namespace::Verification, email, record, remaining).await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Ceremony sessions (single use)
    // ═══════════════════════════════════════════════════════════════════════

    /// Store a challenge session.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    pub async fn save_ceremony(
        &self,
        session_id: &str,
        session: &ChallengeSession,
        ttl: Duration,
    ) -> Result<()> {
        self.put(Namespace::Ceremony, session_id, session, ttl).await
    }

    /// Read and delete a challenge session.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    pub async fn take_ceremony(&self, session_id: &str) -> Result<Option<ChallengeSession>> {
        let bytes = self.store.take(Namespace::Ceremony, session_id).await?;
        Ok(decode(Namespace::Ceremony, bytes))
    }

    /// Store a credential-as-identity registration session.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    pub async fn save_registration(
        &self,
        session_id: &str,
        session: &RegistrationSession,
        ttl: Duration,
    ) -> Result<()> {
        self.put(Namespace::Registration, session_id, session, ttl)
            .await
    }

    /// Read and delete a registration session.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    pub async fn take_registration(&self, session_id: &str) -> Result<Option<RegistrationSession>> {
        let bytes = self.store.take(Namespace::Registration, session_id).await?;
        Ok(decode(Namespace::Registration, bytes))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Authenticated sessions (sliding)
    // ═══════════════════════════════════════════════════════════════════════

    /// Store a new authenticated session.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    pub async fn save_session(
        &self,
        token: &str,
        record: &AuthSessionRecord,
        ttl: Duration,
    ) -> Result<()> {
        self.put(Namespace::AuthSession, token, record, ttl).await
    }

    /// Read a session and push its expiry back to `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    pub async fn touch_session(
        &self,
        token: &str,
        ttl: Duration,
    ) -> Result<Option<AuthSessionRecord>> {
        let bytes = self
            .store
            .get_and_refresh(Namespace::AuthSession, token, ttl)
            .await?;
        Ok(decode(Namespace::AuthSession, bytes))
    }

    /// Delete a session. Deleting an unknown token succeeds.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    pub async fn delete_session(&self, token: &str) -> Result<()> {
        self.store.delete(Namespace::AuthSession, token).await
    }

    async fn put<T: Serialize + Sync>(
        &self,
        namespace: Namespace,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.save(namespace, key, bytes, ttl).await
    }
}

fn decode<T: DeserializeOwned>(namespace: Namespace, bytes: Option<Vec<u8>>) -> Option<T> {
    let bytes = bytes?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(?namespace, error = %e, "Discarding undecodable ephemeral record");
            None
        }
    }
}

#[cfg(all(test, feature = "test-utils"))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::MemoryEphemeralStore;

    fn state() -> StateStore<MemoryEphemeralStore> {
        StateStore::new(MemoryEphemeralStore::new())
    }

    #[tokio::test]
    async fn test_code_overwrite() {
        let state = state();
        state
            .save_code("a@example.com", "111111", Duration::minutes(10))
            .await
            .unwrap();
        state
            .save_code("a@example.com", "222222", Duration::minutes(10))
            .await
            .unwrap();

        let pending = state.take_code("a@example.com").await.unwrap();
        assert_eq!(pending.map(|r| r.code).as_deref(), Some("222222"));
        assert!(state.take_code("a@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_code_respects_lifetime() {
        let state = state();
        let ttl = Duration::minutes(10);

        let fresh = VerificationRecord {
            code: "123456".into(),
            issued_at: Utc::now(),
        };
        state.restore_code("a@example.com", &fresh, ttl).await.unwrap();
        let restored = state.take_code("a@example.com").await.unwrap();
        assert_eq!(restored.map(|r| r.code).as_deref(), Some("123456"));

        let stale = VerificationRecord {
            code: "654321".into(),
            issued_at: Utc::now() - Duration::minutes(11),
        };
        state.restore_code("b@example.com", &stale, ttl).await.unwrap();
        assert!(state.take_code("b@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ceremony_take_is_single_use() {
        let state = state();
        let session = ChallengeSession {
            purpose: CeremonyPurpose::Login,
            state: serde_json::json!({ "challenge": "c" }),
        };
        state
            .save_ceremony("sid", &session, Duration::minutes(5))
            .await
            .unwrap();

        let first = state.take_ceremony("sid").await.unwrap();
        let second = state.take_ceremony("sid").await.unwrap();
        assert_eq!(first, Some(session));
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn test_undecodable_record_reads_as_missing() {
        let state = state();
        state
            .inner()
            .save(
                Namespace::AuthSession,
                "garbage",
                b"not json".to_vec(),
                Duration::hours(1),
            )
            .await
            .unwrap();

        let record = state
            .touch_session("garbage", Duration::hours(1))
            .await
            .unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn test_namespaces_do_not_collide() {
        let state = state();
        let session = ChallengeSession {
            purpose: CeremonyPurpose::Login,
            state: serde_json::Value::Null,
        };
        state
            .save_ceremony("same-key", &session, Duration::minutes(5))
            .await
            .unwrap();

        let registration = state.take_registration("same-key").await.unwrap();
        assert!(registration.is_none());
        assert!(state.take_ceremony("same-key").await.unwrap().is_some());
    }
}
