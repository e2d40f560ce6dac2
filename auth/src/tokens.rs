//! API token manager.
//!
//! Named, non-expiring bearer secrets for machine clients. The secret is
//! shown once at creation; the repository only ever sees its digest.

use crate::error::{AuthError, Result};
use crate::providers::{ApiTokenRecord, IdentityRepository};
use crate::utils::{digest_secret, generate_secret};
use serde::Serialize;
use uuid::Uuid;

/// Longest accepted token name, in characters.
pub const MAX_TOKEN_NAME_LEN: usize = 100;

/// A token returned from creation, secret included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedToken {
    /// Stored record.
    #[serde(flatten)]
    pub record: ApiTokenRecord,
    /// Bearer secret. Not retrievable again.
    pub token: String,
}

/// CRUD over API tokens.
pub struct ApiTokenManager<'a, R> {
    repository: &'a R,
}

impl<'a, R: IdentityRepository> ApiTokenManager<'a, R> {
    /// Create a manager over a repository.
    #[must_use]
    pub const fn new(repository: &'a R) -> Self {
        Self { repository }
    }

    /// All tokens, without secrets.
    ///
    /// # Errors
    ///
    /// Returns error if the repository is unavailable.
    pub async fn list(&self) -> Result<Vec<ApiTokenRecord>> {
        self.repository.list_api_tokens().await
    }

    /// Create a token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidRequest`] for an empty or overlong name.
    pub async fn create(&self, name: &str) -> Result<CreatedToken> {
        let name = validate_name(name)?;
        let token = generate_secret();
        let record = self
            .repository
            .create_api_token(name, &digest_secret(&token))
            .await?;

        tracing::info!(token_id = %record.id, name = %record.name, "API token created");
        Ok(CreatedToken { record, token })
    }

    /// Rename a token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidRequest`] for a bad name or
    /// [`AuthError::TokenNotFound`] for an unknown ID.
    pub async fn rename(&self, id: Uuid, name: &str) -> Result<ApiTokenRecord> {
        let name = validate_name(name)?;
        self.repository
            .rename_api_token(id, name)
            .await?
            .ok_or(AuthError::TokenNotFound)
    }

    /// Delete a token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenNotFound`] for an unknown ID.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.repository.delete_api_token(id).await? {
            return Err(AuthError::TokenNotFound);
        }
        tracing::info!(token_id = %id, "API token deleted");
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::InvalidRequest("name is required".into()));
    }
    if name.chars().count() > MAX_TOKEN_NAME_LEN {
        return Err(AuthError::InvalidRequest(format!(
            "name must be at most {MAX_TOKEN_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

#[cfg(all(test, feature = "test-utils"))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::MockIdentityRepository;

    #[tokio::test]
    async fn test_create_stores_digest_only() {
        let repo = MockIdentityRepository::new();
        let manager = ApiTokenManager::new(&repo);

        let created = manager.create("  ci runner ").await.unwrap();
        assert_eq!(created.record.name, "ci runner");
        assert_eq!(created.token.len(), 43);
        assert_eq!(
            repo.token_digest(created.record.id),
            Some(digest_secret(&created.token))
        );

        let json = serde_json::to_value(&created).unwrap();
        assert_eq!(json["name"], "ci runner");
        assert!(json["token"].is_string());
        assert!(json["id"].is_string());
    }

    #[tokio::test]
    async fn test_empty_names_rejected() {
        let repo = MockIdentityRepository::new();
        let manager = ApiTokenManager::new(&repo);

        assert!(matches!(
            manager.create("   ").await,
            Err(AuthError::InvalidRequest(_))
        ));

        let created = manager.create("ci").await.unwrap();
        assert!(matches!(
            manager.rename(created.record.id, "").await,
            Err(AuthError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let repo = MockIdentityRepository::new();
        let manager = ApiTokenManager::new(&repo);

        assert_eq!(
            manager.rename(Uuid::new_v4(), "x").await,
            Err(AuthError::TokenNotFound)
        );
        assert_eq!(
            manager.delete(Uuid::new_v4()).await,
            Err(AuthError::TokenNotFound)
        );
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let repo = MockIdentityRepository::new();
        let manager = ApiTokenManager::new(&repo);
        let created = manager.create("ci").await.unwrap();

        let renamed = manager.rename(created.record.id, "deploy").await.unwrap();
        assert_eq!(renamed.name, "deploy");
        assert_eq!(manager.list().await.unwrap(), vec![renamed]);

        manager.delete(created.record.id).await.unwrap();
        assert!(manager.list().await.unwrap().is_empty());
        assert_eq!(
            manager.delete(created.record.id).await,
            Err(AuthError::TokenNotFound)
        );
    }
}
