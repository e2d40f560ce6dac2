//! Identity and credential repository trait.
//!
//! The durable side of the system: users, credentials and API tokens. The
//! repository guarantees uniqueness of user email, credential ID, and
//! per-credential user handle.

use crate::credential::{CredentialUsage, StoredCredential};
use crate::error::Result;
use crate::principal::UserAccount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// API token as listed to clients (never includes the secret).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTokenRecord {
    /// Token ID.
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Identity and credential repository.
pub trait IdentityRepository: Send + Sync {
    /// Find a user by normalized email.
    ///
    /// # Errors
    ///
    /// Returns error if the database is unavailable.
    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<UserAccount>>> + Send;

    /// Find a user by ID.
    ///
    /// # Errors
    ///
    /// Returns error if the database is unavailable.
    fn find_user_by_id(
        &self,
        user_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<UserAccount>>> + Send;

    /// Find a user by `WebAuthn` user handle.
    ///
    /// # Errors
    ///
    /// Returns error if the database is unavailable.
    fn find_user_by_handle(
        &self,
        handle: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<UserAccount>>> + Send;

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AlreadyRegistered`](crate::AuthError::AlreadyRegistered)
    /// if the email is taken, or a database error.
    fn create_user(
        &self,
        email: &str,
        handle: Uuid,
    ) -> impl std::future::Future<Output = Result<UserAccount>> + Send;

    /// Credentials bound to a user.
    ///
    /// # Errors
    ///
    /// Returns error if the database is unavailable.
    fn list_credentials_for_user(
        &self,
        user_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<StoredCredential>>> + Send;

    /// Find a credential by its credential ID.
    ///
    /// # Errors
    ///
    /// Returns error if the database is unavailable.
    fn find_credential(
        &self,
        credential_id: &[u8],
    ) -> impl std::future::Future<Output = Result<Option<StoredCredential>>> + Send;

    /// Store a new credential.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialAlreadyRegistered`](crate::AuthError::CredentialAlreadyRegistered)
    /// on a duplicate credential ID or handle, or a database error.
    fn create_credential(
        &self,
        credential: &StoredCredential,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Write back the login-time counter, backup state and engine state.
    ///
    /// The write only applies while the stored counter is below the new one
    /// (or both are zero). Returns `false` when nothing was written, which
    /// means a concurrent login already advanced the counter this far.
    ///
    /// # Errors
    ///
    /// Returns error if the database is unavailable.
    fn record_credential_usage(
        &self,
        usage: &CredentialUsage,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// All API tokens, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if the database is unavailable.
    fn list_api_tokens(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ApiTokenRecord>>> + Send;

    /// Store a new API token under the digest of its secret.
    ///
    /// # Errors
    ///
    /// Returns error if the database is unavailable.
    fn create_api_token(
        &self,
        name: &str,
        secret_digest: &str,
    ) -> impl std::future::Future<Output = Result<ApiTokenRecord>> + Send;

    /// Rename an API token. `None` when the ID does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the database is unavailable.
    fn rename_api_token(
        &self,
        id: Uuid,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<ApiTokenRecord>>> + Send;

    /// Delete an API token. `false` when the ID does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the database is unavailable.
    fn delete_api_token(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Look up an API token by the digest of its secret.
    ///
    /// # Errors
    ///
    /// Returns error if the database is unavailable.
    fn find_api_token_by_digest(
        &self,
        secret_digest: &str,
    ) -> impl std::future::Future<Output = Result<Option<ApiTokenRecord>>> + Send;
}
