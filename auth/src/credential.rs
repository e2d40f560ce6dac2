//! Stored passkey credentials.

use crate::error::{AuthError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who a credential belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialOwner {
    /// Bound to an email-verified user.
    User {
        /// Owning user ID.
        user_id: Uuid,
    },
    /// The credential is its own account.
    Account {
        /// Self-assigned `WebAuthn` user handle.
        handle: Uuid,
        /// Display name chosen at registration.
        display_name: String,
    },
}

/// Credential material produced by a successful registration ceremony.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredCredential {
    /// Opaque credential ID chosen by the authenticator.
    pub credential_id: Vec<u8>,
    /// Public key (COSE, engine encoding).
    pub public_key: Vec<u8>,
    /// Transport hints (`usb`, `nfc`, `ble`, `internal`, `hybrid`).
    pub transports: Vec<String>,
    /// Initial signature counter.
    pub sign_count: u32,
    /// Backup eligibility flag.
    pub backup_eligible: bool,
    /// Backup state flag.
    pub backup_state: bool,
    /// Authenticator attestation GUID (nil when not attested).
    pub aaguid: Uuid,
    /// Engine-specific serialized credential.
    pub engine_state: serde_json::Value,
}

/// A credential row as held by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Opaque credential ID.
    pub credential_id: Vec<u8>,
    /// Owner.
    pub owner: CredentialOwner,
    /// Public key (COSE, engine encoding).
    pub public_key: Vec<u8>,
    /// Transport hints.
    pub transports: Vec<String>,
    /// Last accepted signature counter.
    pub sign_count: u32,
    /// Backup eligibility flag.
    pub backup_eligible: bool,
    /// Backup state flag.
    pub backup_state: bool,
    /// Authenticator attestation GUID.
    pub aaguid: Uuid,
    /// Engine-specific serialized credential.
    pub engine_state: serde_json::Value,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last successful login.
    pub last_used_at: Option<DateTime<Utc>>,
}

impl StoredCredential {
    /// Bind freshly registered material to an owner.
    #[must_use]
    pub fn new(owner: CredentialOwner, registered: RegisteredCredential) -> Self {
        Self {
            credential_id: registered.credential_id,
            owner,
            public_key: registered.public_key,
            transports: registered.transports,
            sign_count: registered.sign_count,
            backup_eligible: registered.backup_eligible,
            backup_state: registered.backup_state,
            aaguid: registered.aaguid,
            engine_state: registered.engine_state,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    /// Display name for self-owned credentials.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        match &self.owner {
            CredentialOwner::Account { display_name, .. } => Some(display_name),
            CredentialOwner::User { .. } => None,
        }
    }
}

/// Login-time update written back after a verified assertion.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialUsage {
    /// Credential that was used.
    pub credential_id: Vec<u8>,
    /// New signature counter.
    pub sign_count: u32,
    /// New backup state flag.
    pub backup_state: bool,
    /// Engine-specific serialized credential after the update.
    pub engine_state: serde_json::Value,
}

/// Reject a signature counter that did not advance.
///
/// Authenticators that do not implement counters report zero forever; a
/// stored and received pair of zeros is accepted.
///
/// # Errors
///
/// Returns [`AuthError::LoginFailed`] when `received <= stored` and either is
/// non-zero.
///
/// ```
/// use passkey_gate_auth::credential::check_sign_count;
///
/// assert!(check_sign_count(4, 5).is_ok());
/// assert!(check_sign_count(0, 0).is_ok());
/// assert!(check_sign_count(5, 5).is_err());
/// assert!(check_sign_count(5, 0).is_err());
/// ```
pub fn check_sign_count(stored: u32, received: u32) -> Result<()> {
    if (stored != 0 || received != 0) && received <= stored {
        tracing::warn!(stored, received, "Signature counter regression");
        return Err(AuthError::LoginFailed);
    }
    Ok(())
}
