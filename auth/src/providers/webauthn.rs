//! `WebAuthn`/Passkey provider trait.
//!
//! The provider is the external ceremony engine: it generates challenges and
//! verifies attestations and assertions. It keeps no state between calls;
//! everything needed to finish a ceremony travels in [`CeremonyChallenge::state`],
//! which the caller persists in the ephemeral store.

use crate::credential::{CredentialUsage, RegisteredCredential, StoredCredential};
use crate::error::Result;
use crate::principal::Principal;
use uuid::Uuid;

/// Output of a begin step.
#[derive(Debug, Clone, PartialEq)]
pub struct CeremonyChallenge {
    /// Options handed to the browser (`navigator.credentials.*`).
    pub options: serde_json::Value,
    /// Engine state needed by the matching finish step.
    pub state: serde_json::Value,
}

/// A credential row together with the principal that owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCredential {
    /// Owning principal.
    pub principal: Principal,
    /// The credential as stored before this login.
    pub credential: StoredCredential,
}

/// Successful discoverable login.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedAssertion {
    /// What the resolver returned.
    pub resolved: ResolvedCredential,
    /// Counter, backup state and engine state to write back.
    pub usage: CredentialUsage,
}

/// Looks up the credential an authenticator presented during discoverable login.
pub trait CredentialResolver: Send + Sync {
    /// Resolve `(credential ID, user handle)` to a stored credential.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::LoginFailed`](crate::AuthError::LoginFailed) when
    /// nothing matches, or an infrastructure error.
    fn resolve(
        &self,
        credential_id: &[u8],
        user_handle: Uuid,
    ) -> impl std::future::Future<Output = Result<ResolvedCredential>> + Send;
}

/// `WebAuthn` provider.
///
/// # Errors
///
/// Verification failures are reported as
/// [`AuthError::RegistrationFailed`](crate::AuthError::RegistrationFailed) or
/// [`AuthError::LoginFailed`](crate::AuthError::LoginFailed), including
/// signature counter regression. Engine faults unrelated to the client's
/// response are [`AuthError::EngineError`](crate::AuthError::EngineError).
pub trait WebAuthnProvider: Send + Sync {
    /// Begin a registration ceremony requesting a discoverable credential.
    ///
    /// Credentials already bound to `principal` are excluded.
    fn begin_registration(
        &self,
        principal: &Principal,
    ) -> impl std::future::Future<Output = Result<CeremonyChallenge>> + Send;

    /// Verify the browser's attestation against the stored state.
    fn finish_registration(
        &self,
        principal: &Principal,
        state: &serde_json::Value,
        response: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<RegisteredCredential>> + Send;

    /// Begin a login ceremony with an empty allowed-credential list.
    fn begin_discoverable_login(
        &self,
    ) -> impl std::future::Future<Output = Result<CeremonyChallenge>> + Send;

    /// Verify the browser's assertion, resolving the credential through `resolver`.
    fn finish_discoverable_login<C: CredentialResolver>(
        &self,
        state: &serde_json::Value,
        response: &serde_json::Value,
        resolver: &C,
    ) -> impl std::future::Future<Output = Result<VerifiedAssertion>> + Send;
}
