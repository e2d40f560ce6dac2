//! Principals: the identities ceremonies register and sessions carry.
//!
//! Two identity models exist and exactly one is active per deployment
//! (see [`IdentityModel`](crate::config::IdentityModel)):
//!
//! - **Email-verified users** own zero or more credentials.
//! - **Credential-as-identity**: every credential is an account of its own,
//!   named by the display name chosen at registration.
//!
//! Both surface the same capability to the `WebAuthn` engine: a stable handle,
//! a name, a display name and the bound credential list.

use crate::credential::{CredentialOwner, StoredCredential};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Email-verified user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    /// User ID.
    pub id: Uuid,
    /// Normalized email address (unique).
    pub email: String,
    /// `WebAuthn` user handle.
    pub handle: Uuid,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Credential-as-identity account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialAccount {
    /// Self-assigned `WebAuthn` user handle.
    pub handle: Uuid,
    /// Display name.
    pub display_name: String,
}

/// An identity taking part in a ceremony.
#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    /// Email-verified user and its credentials.
    User {
        /// Account.
        account: UserAccount,
        /// Bound credentials.
        credentials: Vec<StoredCredential>,
    },
    /// Credential-as-identity account; `credential` is `None` until registered.
    Credential {
        /// Account.
        account: CredentialAccount,
        /// The credential that is this account.
        credential: Option<StoredCredential>,
    },
}

impl Principal {
    /// Stable per-principal `WebAuthn` user handle.
    #[must_use]
    pub const fn handle(&self) -> Uuid {
        match self {
            Self::User { account, .. } => account.handle,
            Self::Credential { account, .. } => account.handle,
        }
    }

    /// Account name presented to authenticators.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::User { account, .. } => &account.email,
            Self::Credential { account, .. } => &account.display_name,
        }
    }

    /// Human-readable display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name()
    }

    /// Credentials bound to this principal.
    #[must_use]
    pub fn credentials(&self) -> &[StoredCredential] {
        match self {
            Self::User { credentials, .. } => credentials,
            Self::Credential { credential, .. } => credential.as_slice(),
        }
    }

    /// Owner record for a credential registered to this principal.
    #[must_use]
    pub fn owner(&self) -> CredentialOwner {
        match self {
            Self::User { account, .. } => CredentialOwner::User {
                user_id: account.id,
            },
            Self::Credential { account, .. } => CredentialOwner::Account {
                handle: account.handle,
                display_name: account.display_name.clone(),
            },
        }
    }

    /// Claims carried by an authenticated session for this principal.
    #[must_use]
    pub fn claims(&self) -> SessionClaims {
        match self {
            Self::User { account, .. } => SessionClaims::User {
                user_id: account.id,
                email: account.email.clone(),
            },
            Self::Credential { account, .. } => SessionClaims::Credential {
                handle: account.handle,
                display_name: account.display_name.clone(),
            },
        }
    }
}

/// Identity stored in an authenticated session and injected into proxied requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionClaims {
    /// Email-verified user.
    User {
        /// User ID.
        user_id: Uuid,
        /// Email address.
        email: String,
    },
    /// Credential-as-identity account.
    Credential {
        /// Credential user handle.
        handle: Uuid,
        /// Display name.
        display_name: String,
    },
}

impl SessionClaims {
    /// Subject identifier.
    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Self::User { user_id, .. } => user_id.to_string(),
            Self::Credential { handle, .. } => handle.to_string(),
        }
    }

    /// Human-readable name (email or display name).
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::User { email, .. } => email,
            Self::Credential { display_name, .. } => display_name,
        }
    }

    /// Email, for the email-verified model.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        match self {
            Self::User { email, .. } => Some(email),
            Self::Credential { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Principal {
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

    #[test]
    fn test_user_claims_carry_email() {
        let principal = user();
        let claims = principal.claims();
        assert_eq!(claims.email(), Some("alice@example.com"));
        assert_eq!(claims.name(), "alice@example.com");
        assert!(matches!(principal.owner(), CredentialOwner::User { .. }));
    }

    #[test]
    fn test_credential_account_claims() {
        let handle = Uuid::new_v4();
        let principal = Principal::Credential {
            account: CredentialAccount {
                handle,
                display_name: "Kitchen tablet".into(),
            },
            credential: None,
        };

        assert_eq!(principal.handle(), handle);
        assert!(principal.credentials().is_empty());
        let claims = principal.claims();
        assert_eq!(claims.email(), None);
        assert_eq!(claims.subject(), handle.to_string());
        assert_eq!(claims.name(), "Kitchen tablet");
    }

    #[test]
    fn test_claims_json_shape() {
        let claims = SessionClaims::Credential {
            handle: Uuid::nil(),
            display_name: "n".into(),
        };
        let json = serde_json::to_value(&claims).unwrap_or_default();
        assert_eq!(json["kind"], "credential");
        assert_eq!(json["display_name"], "n");
    }
}
