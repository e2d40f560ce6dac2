//! PostgreSQL identity repository implementation.
//!
//! Tables (see `migrations/`): `users`, `credentials`, `api_tokens`. Unique
//! constraints on email, credential ID, credential handle and token digest
//! are enforced by the schema; violations surface as conflict errors.
//!
//! # Example
//!
//! ```no_run
//! use passkey_gate_auth::stores::postgres::PostgresIdentityRepository;
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgresql://localhost/auth").await?;
//! let repo = PostgresIdentityRepository::new(pool);
//! repo.migrate().await?;
//! # Ok(())
//! # }
//! ```

use crate::credential::{CredentialOwner, CredentialUsage, StoredCredential};
use crate::error::{AuthError, Result};
use crate::principal::UserAccount;
use crate::providers::{ApiTokenRecord, IdentityRepository};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const CREDENTIAL_COLUMNS: &str = "credential_id, user_id, handle, display_name, public_key, \
     transports, sign_count, backup_eligible, backup_state, aaguid, engine_state, \
     created_at, last_used_at";

/// PostgreSQL identity repository.
#[derive(Clone)]
pub struct PostgresIdentityRepository {
    /// PostgreSQL connection pool.
    pool: PgPool,
}

impl PostgresIdentityRepository {
    /// Create a new PostgreSQL identity repository.
    ///
    /// # Arguments
    ///
    /// * `pool` - PostgreSQL connection pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

fn db_error(context: &str) -> impl FnOnce(sqlx::Error) -> AuthError + '_ {
    move |e| AuthError::DatabaseError(format!("{context}: {e}"))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn user_from_row(row: &PgRow) -> Result<UserAccount> {
    Ok(UserAccount {
        id: row.try_get("id").map_err(db_error("Failed to decode user"))?,
        email: row.try_get("email").map_err(db_error("Failed to decode user"))?,
        handle: row.try_get("handle").map_err(db_error("Failed to decode user"))?,
        created_at: row
            .try_get("created_at")
            .map_err(db_error("Failed to decode user"))?,
    })
}

fn token_from_row(row: &PgRow) -> Result<ApiTokenRecord> {
    Ok(ApiTokenRecord {
        id: row.try_get("id").map_err(db_error("Failed to decode token"))?,
        name: row.try_get("name").map_err(db_error("Failed to decode token"))?,
        created_at: row
            .try_get("created_at")
            .map_err(db_error("Failed to decode token"))?,
    })
}

fn credential_from_row(row: &PgRow) -> Result<StoredCredential> {
    let get = |e: sqlx::Error| AuthError::DatabaseError(format!("Failed to decode credential: {e}"));

    let user_id: Option<Uuid> = row.try_get("user_id").map_err(get)?;
    let handle: Option<Uuid> = row.try_get("handle").map_err(get)?;
    let display_name: Option<String> = row.try_get("display_name").map_err(get)?;

    let owner = match (user_id, handle) {
        (Some(user_id), _) => CredentialOwner::User { user_id },
        (None, Some(handle)) => CredentialOwner::Account {
            handle,
            display_name: display_name.unwrap_or_default(),
        },
        (None, None) => {
            return Err(AuthError::DatabaseError(
                "Credential row has no owner".to_string(),
            ));
        }
    };

    let sign_count: i64 = row.try_get("sign_count").map_err(get)?;
    let last_used_at: Option<DateTime<Utc>> = row.try_get("last_used_at").map_err(get)?;

    Ok(StoredCredential {
        credential_id: row.try_get("credential_id").map_err(get)?,
        owner,
        public_key: row.try_get("public_key").map_err(get)?,
        transports: row.try_get("transports").map_err(get)?,
        sign_count: u32::try_from(sign_count).unwrap_or(u32::MAX),
        backup_eligible: row.try_get("backup_eligible").map_err(get)?,
        backup_state: row.try_get("backup_state").map_err(get)?,
        aaguid: row.try_get("aaguid").map_err(get)?,
        engine_state: row.try_get("engine_state").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
        last_used_at,
    })
}

impl IdentityRepository for PostgresIdentityRepository {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        sqlx::query("SELECT id, email, handle, created_at FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to get user"))?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<UserAccount>> {
        sqlx::query("SELECT id, email, handle, created_at FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to get user"))?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn find_user_by_handle(&self, handle: Uuid) -> Result<Option<UserAccount>> {
        sqlx::query("SELECT id, email, handle, created_at FROM users WHERE handle = $1")
            .bind(handle)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to get user"))?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn create_user(&self, email: &str, handle: Uuid) -> Result<UserAccount> {
        let row = sqlx::query(
            r"
            INSERT INTO users (id, email, handle, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, email, handle, created_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(handle)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AuthError::AlreadyRegistered;
            }
            AuthError::DatabaseError(format!("Failed to create user: {e}"))
        })?;

        user_from_row(&row)
    }

    async fn list_credentials_for_user(&self, user_id: Uuid) -> Result<Vec<StoredCredential>> {
        let query = format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE user_id = $1 ORDER BY created_at"
        );
        sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list credentials"))?
            .iter()
            .map(credential_from_row)
            .collect()
    }

    async fn find_credential(&self, credential_id: &[u8]) -> Result<Option<StoredCredential>> {
        let query = format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE credential_id = $1");
        sqlx::query(&query)
            .bind(credential_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to get credential"))?
            .as_ref()
            .map(credential_from_row)
            .transpose()
    }

    async fn create_credential(&self, credential: &StoredCredential) -> Result<()> {
        let (user_id, handle, display_name) = match &credential.owner {
            CredentialOwner::User { user_id } => (Some(*user_id), None, None),
            CredentialOwner::Account {
                handle,
                display_name,
            } => (None, Some(*handle), Some(display_name.as_str())),
        };

        sqlx::query(
            r"
            INSERT INTO credentials
                (credential_id, user_id, handle, display_name, public_key, transports,
                 sign_count, backup_eligible, backup_state, aaguid, engine_state, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(&credential.credential_id)
        .bind(user_id)
        .bind(handle)
        .bind(display_name)
        .bind(&credential.public_key)
        .bind(&credential.transports)
        .bind(i64::from(credential.sign_count))
        .bind(credential.backup_eligible)
        .bind(credential.backup_state)
        .bind(credential.aaguid)
        .bind(&credential.engine_state)
        .bind(credential.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AuthError::CredentialAlreadyRegistered;
            }
            AuthError::DatabaseError(format!("Failed to create credential: {e}"))
        })?;

        Ok(())
    }

    async fn record_credential_usage(&self, usage: &CredentialUsage) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE credentials
            SET sign_count = $2,
                backup_state = $3,
                engine_state = $4,
                last_used_at = NOW()
            WHERE credential_id = $1
              AND (sign_count < $2 OR (sign_count = 0 AND $2 = 0))
            ",
        )
        .bind(&usage.credential_id)
        .bind(i64::from(usage.sign_count))
        .bind(usage.backup_state)
        .bind(&usage.engine_state)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update credential"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_api_tokens(&self) -> Result<Vec<ApiTokenRecord>> {
        sqlx::query("SELECT id, name, created_at FROM api_tokens ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list tokens"))?
            .iter()
            .map(token_from_row)
            .collect()
    }

    async fn create_api_token(&self, name: &str, secret_digest: &str) -> Result<ApiTokenRecord> {
        let row = sqlx::query(
            r"
            INSERT INTO api_tokens (id, name, secret_digest, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, name, created_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(secret_digest)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create token"))?;

        token_from_row(&row)
    }

    async fn rename_api_token(&self, id: Uuid, name: &str) -> Result<Option<ApiTokenRecord>> {
        sqlx::query("UPDATE api_tokens SET name = $2 WHERE id = $1 RETURNING id, name, created_at")
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to rename token"))?
            .as_ref()
            .map(token_from_row)
            .transpose()
    }

    async fn delete_api_token(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM api_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete token"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_api_token_by_digest(&self, secret_digest: &str) -> Result<Option<ApiTokenRecord>> {
        sqlx::query("SELECT id, name, created_at FROM api_tokens WHERE secret_digest = $1")
            .bind(secret_digest)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to get token"))?
            .as_ref()
            .map(token_from_row)
            .transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::credential::RegisteredCredential;

    async fn repo() -> PostgresIdentityRepository {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.expect("Failed to connect");
        let repo = PostgresIdentityRepository::new(pool);
        repo.migrate().await.expect("Failed to migrate");
        repo
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_user_and_credential_roundtrip() {
        let repo = repo().await;
        let email = format!("{}@example.com", Uuid::new_v4());
        let user = repo.create_user(&email, Uuid::new_v4()).await.unwrap();

        assert_eq!(
            repo.create_user(&email, Uuid::new_v4()).await,
            Err(AuthError::AlreadyRegistered)
        );

        let credential = StoredCredential::new(
            CredentialOwner::User { user_id: user.id },
            RegisteredCredential {
                credential_id: Uuid::new_v4().as_bytes().to_vec(),
                public_key: vec![1, 2, 3],
                transports: vec!["internal".into()],
                sign_count: 0,
                backup_eligible: true,
                backup_state: false,
                aaguid: Uuid::nil(),
                engine_state: serde_json::json!({ "counter": 0 }),
            },
        );
        repo.create_credential(&credential).await.unwrap();
        assert_eq!(
            repo.create_credential(&credential).await,
            Err(AuthError::CredentialAlreadyRegistered)
        );

        let usage = CredentialUsage {
            credential_id: credential.credential_id.clone(),
            sign_count: 3,
            backup_state: true,
            engine_state: serde_json::json!({ "counter": 3 }),
        };
        assert!(repo.record_credential_usage(&usage).await.unwrap());
        let stale = CredentialUsage {
            credential_id: credential.credential_id.clone(),
            sign_count: 2,
            backup_state: false,
            engine_state: serde_json::json!({ "counter": 2 }),
        };
        assert!(!repo.record_credential_usage(&stale).await.unwrap());

        let stored = repo
            .find_credential(&credential.credential_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.sign_count, 3);
        assert!(stored.backup_state);
        assert!(stored.last_used_at.is_some());
        assert_eq!(repo.list_credentials_for_user(user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL running
    async fn test_api_token_crud() {
        let repo = repo().await;
        let digest = Uuid::new_v4().to_string();
        let record = repo.create_api_token("ci", &digest).await.unwrap();

        let found = repo.find_api_token_by_digest(&digest).await.unwrap();
        assert_eq!(found.map(|r| r.id), Some(record.id));

        let renamed = repo.rename_api_token(record.id, "deploy").await.unwrap();
        assert_eq!(renamed.map(|r| r.name).as_deref(), Some("deploy"));

        assert!(repo.delete_api_token(record.id).await.unwrap());
        assert!(!repo.delete_api_token(record.id).await.unwrap());
        assert!(repo.rename_api_token(record.id, "x").await.unwrap().is_none());
    }
}
