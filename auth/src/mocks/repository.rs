//! In-memory identity repository for testing.

use crate::credential::{CredentialOwner, CredentialUsage, StoredCredential};
use crate::error::{AuthError, Result};
use crate::principal::UserAccount;
use crate::providers::{ApiTokenRecord, IdentityRepository};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserAccount>,
    credentials: Vec<StoredCredential>,
    tokens: Vec<(ApiTokenRecord, String)>,
}

/// Mock identity repository.
///
/// Enforces the same unique constraints as the Postgres schema: user email,
/// credential ID, and per-account user handle.
///
/// **WARNING**: Do NOT use in production. This is for testing only!
#[derive(Clone, Default)]
pub struct MockIdentityRepository {
    tables: Arc<Mutex<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl MockIdentityRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a database error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored credentials.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    #[must_use]
    pub fn credential_count(&self) -> usize {
        self.tables.lock().unwrap().credentials.len()
    }

    /// Stored credential by ID.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    #[must_use]
    pub fn credential(&self, credential_id: &[u8]) -> Option<StoredCredential> {
        self.tables
            .lock()
            .unwrap()
            .credentials
            .iter()
            .find(|c| c.credential_id == credential_id)
            .cloned()
    }

    /// Stored digest for a token ID.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    #[must_use]
    pub fn token_digest(&self, id: Uuid) -> Option<String> {
        self.tables
            .lock()
            .unwrap()
            .tokens
            .iter()
            .find(|(record, _)| record.id == id)
            .map(|(_, digest)| digest.clone())
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    fn tables(&self) -> Result<std::sync::MutexGuard<'_, Tables>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::DatabaseError("repository unavailable".into()));
        }
        Ok(self.tables.lock().unwrap())
    }
}

impl IdentityRepository for MockIdentityRepository {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        let tables = self.tables()?;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<UserAccount>> {
        Ok(self.tables()?.users.get(&user_id).cloned())
    }

    async fn find_user_by_handle(&self, handle: Uuid) -> Result<Option<UserAccount>> {
        let tables = self.tables()?;
        Ok(tables.users.values().find(|u| u.handle == handle).cloned())
    }

    async fn create_user(&self, email: &str, handle: Uuid) -> Result<UserAccount> {
        let mut tables = self.tables()?;
        if tables.users.values().any(|u| u.email == email) {
            return Err(AuthError::AlreadyRegistered);
        }

        let user = UserAccount {
            id: Uuid::new_v4(),
            email: email.to_string(),
            handle,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list_credentials_for_user(&self, user_id: Uuid) -> Result<Vec<StoredCredential>> {
        let tables = self.tables()?;
        Ok(tables
            .credentials
            .iter()
            .filter(|c| c.owner == CredentialOwner::User { user_id })
            .cloned()
            .collect())
    }

    async fn find_credential(&self, credential_id: &[u8]) -> Result<Option<StoredCredential>> {
        let tables = self.tables()?;
        Ok(tables
            .credentials
            .iter()
            .find(|c| c.credential_id == credential_id)
            .cloned())
    }

    async fn create_credential(&self, credential: &StoredCredential) -> Result<()> {
        let mut tables = self.tables()?;
        let handle_taken = |existing: &StoredCredential| match (&existing.owner, &credential.owner) {
            (
                CredentialOwner::Account { handle: a, .. },
                CredentialOwner::Account { handle: b, .. },
            ) => a == b,
            _ => false,
        };

        if tables
            .credentials
            .iter()
            .any(|c| c.credential_id == credential.credential_id || handle_taken(c))
        {
            return Err(AuthError::CredentialAlreadyRegistered);
        }

        tables.credentials.push(credential.clone());
        Ok(())
    }

    async fn record_credential_usage(&self, usage: &CredentialUsage) -> Result<bool> {
        let mut tables = self.tables()?;
        let Some(credential) = tables
            .credentials
            .iter_mut()
            .find(|c| c.credential_id == usage.credential_id)
        else {
            return Ok(false);
        };
        let advances = credential.sign_count < usage.sign_count
            || (credential.sign_count == 0 && usage.sign_count == 0);
        if !advances {
            return Ok(false);
        }
        credential.sign_count = usage.sign_count;
        credential.backup_state = usage.backup_state;
        credential.engine_state = usage.engine_state.clone();
        credential.last_used_at = Some(Utc::now());
        Ok(true)
    }

    async fn list_api_tokens(&self) -> Result<Vec<ApiTokenRecord>> {
        let tables = self.tables()?;
        Ok(tables.tokens.iter().map(|(record, _)| record.clone()).collect())
    }

    async fn create_api_token(&self, name: &str, secret_digest: &str) -> Result<ApiTokenRecord> {
        let mut tables = self.tables()?;
        let record = ApiTokenRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        tables
            .tokens
            .push((record.clone(), secret_digest.to_string()));
        Ok(record)
    }

    async fn rename_api_token(&self, id: Uuid, name: &str) -> Result<Option<ApiTokenRecord>> {
        let mut tables = self.tables()?;
        Ok(tables
            .tokens
            .iter_mut()
            .find(|(record, _)| record.id == id)
            .map(|(record, _)| {
                record.name = name.to_string();
                record.clone()
            }))
    }

    async fn delete_api_token(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables()?;
        let before = tables.tokens.len();
        tables.tokens.retain(|(record, _)| record.id != id);
        Ok(tables.tokens.len() != before)
    }

    async fn find_api_token_by_digest(&self, secret_digest: &str) -> Result<Option<ApiTokenRecord>> {
        let tables = self.tables()?;
        Ok(tables
            .tokens
            .iter()
            .find(|(_, digest)| digest == secret_digest)
            .map(|(record, _)| record.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::credential::RegisteredCredential;

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let repo = MockIdentityRepository::new();
        repo.create_user("a@example.com", Uuid::new_v4()).await.unwrap();
        let again = repo.create_user("a@example.com", Uuid::new_v4()).await;
        assert_eq!(again, Err(AuthError::AlreadyRegistered));
    }

    #[tokio::test]
    async fn test_token_lifecycle() {
        let repo = MockIdentityRepository::new();
        let record = repo.create_api_token("ci", "digest").await.unwrap();

        let found = repo.find_api_token_by_digest("digest").await.unwrap();
        assert_eq!(found.as_ref().map(|r| r.id), Some(record.id));

        let renamed = repo.rename_api_token(record.id, "deploy").await.unwrap();
        assert_eq!(renamed.map(|r| r.name).as_deref(), Some("deploy"));

        assert!(repo.delete_api_token(record.id).await.unwrap());
        assert!(!repo.delete_api_token(record.id).await.unwrap());
    }

    fn usage(credential_id: &[u8], sign_count: u32) -> CredentialUsage {
        CredentialUsage {
            credential_id: credential_id.to_vec(),
            sign_count,
            backup_state: false,
            engine_state: serde_json::json!({ "counter": sign_count }),
        }
    }

    #[tokio::test]
    async fn test_usage_never_lowers_counter() {
        let repo = MockIdentityRepository::new();
        let credential = StoredCredential::new(
            CredentialOwner::Account {
                handle: Uuid::new_v4(),
                display_name: "Laptop".into(),
            },
            RegisteredCredential {
                credential_id: vec![7; 16],
                public_key: vec![1, 2, 3],
                transports: Vec::new(),
                sign_count: 5,
                backup_eligible: false,
                backup_state: false,
                aaguid: Uuid::nil(),
                engine_state: serde_json::json!({ "counter": 5 }),
            },
        );
        repo.create_credential(&credential).await.unwrap();

        assert!(repo.record_credential_usage(&usage(&[7; 16], 7)).await.unwrap());
        assert!(!repo.record_credential_usage(&usage(&[7; 16], 6)).await.unwrap());
        assert!(!repo.record_credential_usage(&usage(&[7; 16], 7)).await.unwrap());
        assert_eq!(repo.credential(&[7; 16]).unwrap().sign_count, 7);
    }
}
