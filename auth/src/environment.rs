//! Authentication environment.
//!
//! Bundles every collaborator the passkey gate needs plus its configuration.
//! The orchestrator, session issuer and token manager are cheap borrowed
//! views over one environment; the HTTP layer shares it behind an `Arc`.

use crate::ceremony::CeremonyOrchestrator;
use crate::config::AuthConfig;
use crate::providers::{CodeSender, EphemeralStore, IdentityRepository, WebAuthnProvider};
use crate::session::SessionIssuer;
use crate::stores::StateStore;
use crate::tokens::ApiTokenManager;

/// Authentication environment.
///
/// # Type Parameters
///
/// - `S`: Ephemeral store (`Redis`)
/// - `R`: Identity repository (`PostgreSQL`)
/// - `W`: `WebAuthn` provider
/// - `M`: Verification code sender
#[derive(Clone)]
pub struct AuthEnvironment<S, R, W, M>
where
    S: EphemeralStore,
    R: IdentityRepository,
    W: WebAuthnProvider,
    M: CodeSender,
{
    /// Typed ephemeral state.
    pub state: StateStore<S>,

    /// Users, credentials and API tokens.
    pub repository: R,

    /// Ceremony engine.
    pub webauthn: W,

    /// Verification code delivery.
    pub codes: M,

    /// Configuration.
    pub config: AuthConfig,
}

impl<S, R, W, M> AuthEnvironment<S, R, W, M>
where
    S: EphemeralStore,
    R: IdentityRepository,
    W: WebAuthnProvider,
    M: CodeSender,
{
    /// Create a new authentication environment.
    #[must_use]
    pub const fn new(store: S, repository: R, webauthn: W, codes: M, config: AuthConfig) -> Self {
        Self {
            state: StateStore::new(store),
            repository,
            webauthn,
            codes,
            config,
        }
    }

    /// Registration and login ceremonies.
    #[must_use]
    pub const fn ceremonies(&self) -> CeremonyOrchestrator<'_, S, R, W, M> {
        CeremonyOrchestrator::new(self)
    }

    /// Session issue, validation and introspection.
    #[must_use]
    pub const fn sessions(&self) -> SessionIssuer<'_, S, R> {
        SessionIssuer::new(&self.state, &self.repository, &self.config.session)
    }

    /// API token CRUD.
    #[must_use]
    pub const fn tokens(&self) -> ApiTokenManager<'_, R> {
        ApiTokenManager::new(&self.repository)
    }
}
