//! Session issuer and validator.
//!
//! Authenticated sessions are opaque random tokens stored in the ephemeral
//! store with a sliding TTL. API tokens are the second, non-expiring way in
//! and are checked against the repository, never the ephemeral store.

use crate::config::SessionConfig;
use crate::error::{AuthError, Result};
use crate::principal::{Principal, SessionClaims};
use crate::providers::{ApiTokenRecord, EphemeralStore, IdentityRepository};
use crate::stores::{AuthSessionRecord, StateStore};
use crate::utils::{digest_secret, generate_secret};
use chrono::Utc;

/// A freshly issued session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    /// Opaque session token (cookie value).
    pub token: String,
    /// Identity bound to the token.
    pub claims: SessionClaims,
}

/// Who a forward-auth request is authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Browser session.
    Session(SessionClaims),
    /// Machine client holding an API token.
    ApiToken(ApiTokenRecord),
}

/// Issues and validates authenticated sessions.
pub struct SessionIssuer<'a, S, R> {
    state: &'a StateStore<S>,
    repository: &'a R,
    config: &'a SessionConfig,
}

impl<'a, S, R> SessionIssuer<'a, S, R>
where
    S: EphemeralStore,
    R: IdentityRepository,
{
    /// Create an issuer over borrowed collaborators.
    #[must_use]
    pub const fn new(state: &'a StateStore<S>, repository: &'a R, config: &'a SessionConfig) -> Self {
        Self {
            state,
            repository,
            config,
        }
    }

    /// Sliding session window.
    #[must_use]
    pub const fn ttl(&self) -> chrono::Duration {
        self.config.ttl
    }

    /// Mint a session for an authenticated principal.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    pub async fn issue(&self, principal: &Principal) -> Result<IssuedSession> {
        let token = generate_secret();
        let claims = principal.claims();
        let record = AuthSessionRecord {
            claims: claims.clone(),
            created_at: Utc::now(),
        };

        self.state
            .save_session(&token, &record, self.config.ttl)
            .await?;

        tracing::info!(subject = %claims.subject(), "Session issued");
        Ok(IssuedSession { token, claims })
    }

    /// Validate a session token and extend its lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthenticated`] for unknown, expired or
    /// undecodable sessions, or a storage error.
    pub async fn validate(&self, token: &str) -> Result<SessionClaims> {
        if token.is_empty() {
            return Err(AuthError::Unauthenticated);
        }

        self.state
            .touch_session(token, self.config.ttl)
            .await?
            .map(|record| record.claims)
            .ok_or(AuthError::Unauthenticated)
    }

    /// Forward-auth check: session cookie first, then bearer API token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthenticated`] when neither credential is
    /// valid, or an infrastructure error.
    pub async fn introspect(&self, cookie: Option<&str>, bearer: Option<&str>) -> Result<Identity> {
        if let Some(token) = cookie {
            match self.validate(token).await {
                Ok(claims) => return Ok(Identity::Session(claims)),
                Err(AuthError::Unauthenticated) => {}
                Err(e) => return Err(e),
            }
        }

        if let Some(secret) = bearer.filter(|s| !s.is_empty()) {
            if let Some(record) = self
                .repository
                .find_api_token_by_digest(&digest_secret(secret))
                .await?
            {
                tracing::debug!(token_id = %record.id, "Authenticated by API token");
                return Ok(Identity::ApiToken(record));
            }
        }

        Err(AuthError::Unauthenticated)
    }

    /// End a session. Unknown or missing tokens are not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable.
    pub async fn logout(&self, token: Option<&str>) -> Result<()> {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.state.delete_session(token).await?;
            tracing::info!("Session ended");
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "test-utils"))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::{MemoryEphemeralStore, MockIdentityRepository};
    use crate::principal::UserAccount;
    use chrono::Duration;
    use uuid::Uuid;

    fn principal() -> Principal {
        Principal::User {
            account: UserAccount {
                id: Uuid::new_v4(),
                email: "alice@example.com".into(),
                handle: Uuid::new_v4(),
                created_at: Utc::now(),
            },
            credentials: Vec::new(),
        }
    }

    struct Fixture {
        state: StateStore<MemoryEphemeralStore>,
        repository: MockIdentityRepository,
        config: SessionConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                state: StateStore::new(MemoryEphemeralStore::new()),
                repository: MockIdentityRepository::new(),
                config: SessionConfig::new().with_ttl(Duration::minutes(15)),
            }
        }

        fn issuer(&self) -> SessionIssuer<'_, MemoryEphemeralStore, MockIdentityRepository> {
            SessionIssuer::new(&self.state, &self.repository, &self.config)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sliding_ttl() {
        let fixture = Fixture::new();
        let issuer = fixture.issuer();
        let session = issuer.issue(&principal()).await.unwrap();

        // Validated just before expiry: still valid, window restarts.
        tokio::time::advance(std::time::Duration::from_secs(14 * 60)).await;
        assert!(issuer.validate(&session.token).await.is_ok());

        // Past the original window but inside the refreshed one.
        tokio::time::advance(std::time::Duration::from_secs(10 * 60)).await;
        assert!(issuer.validate(&session.token).await.is_ok());

        // No access for a full window.
        tokio::time::advance(std::time::Duration::from_secs(16 * 60)).await;
        assert_eq!(
            issuer.validate(&session.token).await,
            Err(AuthError::Unauthenticated)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_expires_without_access() {
        let fixture = Fixture::new();
        let issuer = fixture.issuer();
        let session = issuer.issue(&principal()).await.unwrap();

        tokio::time::advance(std::time::Duration::from_secs(15 * 60 + 1)).await;
        assert_eq!(
            issuer.validate(&session.token).await,
            Err(AuthError::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn test_cookie_wins_over_bearer() {
        let fixture = Fixture::new();
        let issuer = fixture.issuer();
        let session = issuer.issue(&principal()).await.unwrap();
        fixture
            .repository
            .create_api_token("ci", &digest_secret("secret"))
            .await
            .unwrap();

        let identity = issuer
            .introspect(Some(&session.token), Some("secret"))
            .await
            .unwrap();
        assert!(matches!(identity, Identity::Session(_)));
    }

    #[tokio::test]
    async fn test_bad_cookie_falls_back_to_bearer() {
        let fixture = Fixture::new();
        let issuer = fixture.issuer();
        fixture
            .repository
            .create_api_token("ci", &digest_secret("secret"))
            .await
            .unwrap();

        let identity = issuer
            .introspect(Some("stale"), Some("secret"))
            .await
            .unwrap();
        assert!(matches!(identity, Identity::ApiToken(record) if record.name == "ci"));

        assert_eq!(
            issuer.introspect(None, Some("wrong")).await,
            Err(AuthError::Unauthenticated)
        );
        assert_eq!(
            issuer.introspect(None, None).await,
            Err(AuthError::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let fixture = Fixture::new();
        let issuer = fixture.issuer();
        let session = issuer.issue(&principal()).await.unwrap();

        assert!(issuer.logout(Some(&session.token)).await.is_ok());
        assert!(issuer.logout(Some(&session.token)).await.is_ok());
        assert!(issuer.logout(None).await.is_ok());
        assert_eq!(
            issuer.validate(&session.token).await,
            Err(AuthError::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn test_store_outage_is_not_unauthenticated() {
        let fixture = Fixture::new();
        fixture.state.inner().set_unavailable(true);
        let result = fixture.issuer().introspect(Some("token"), None).await;
        assert!(matches!(result, Err(AuthError::StorageError(_))));
    }
}
