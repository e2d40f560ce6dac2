//! Error types for passkey ceremonies, sessions and API tokens.
//!
//! Every [`AuthError`] belongs to exactly one [`ErrorKind`]. The kind decides
//! the HTTP status; the variant decides what gets logged.

use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Client-observable error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input (400).
    Validation,
    /// Duplicate registration (409).
    Conflict,
    /// Bad or expired session, bad code, failed ceremony (401).
    Unauthenticated,
    /// Unknown token or unavailable route (404).
    NotFound,
    /// Store, repository, engine or mailer unavailable (500).
    Infrastructure,
}

impl ErrorKind {
    /// HTTP status code for this category.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Conflict => 409,
            Self::Unauthenticated => 401,
            Self::NotFound => 404,
            Self::Infrastructure => 500,
        }
    }

    /// Stable machine-readable code for JSON error bodies.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "BAD_REQUEST",
            Self::Conflict => "CONFLICT",
            Self::Unauthenticated => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::Infrastructure => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// Error taxonomy for the passkey gate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Validation
    // ═══════════════════════════════════════════════════════════

    /// Request body or parameter is malformed or missing.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No verification code is pending for this email (absent or expired).
    #[error("No pending verification or code expired")]
    NoPendingVerification,

    /// The ceremony cookie was not sent.
    #[error("Missing ceremony session")]
    MissingSession,

    /// The ceremony session is gone: expired, already consumed, or undecodable.
    #[error("Ceremony session expired or invalid")]
    SessionExpired,

    /// The engine rejected the registration response.
    #[error("Registration failed")]
    RegistrationFailed,

    // ═══════════════════════════════════════════════════════════
    // Conflict
    // ═══════════════════════════════════════════════════════════

    /// The email already has a bound credential.
    #[error("Email already registered")]
    AlreadyRegistered,

    /// The credential ID is already stored.
    #[error("Credential already registered")]
    CredentialAlreadyRegistered,

    // ═══════════════════════════════════════════════════════════
    // Unauthenticated
    // ═══════════════════════════════════════════════════════════

    /// The verification code does not match.
    #[error("Invalid verification code")]
    CodeMismatch,

    /// The engine rejected the login assertion.
    #[error("Login failed")]
    LoginFailed,

    /// No valid session cookie or API token.
    #[error("Unauthenticated")]
    Unauthenticated,

    // ═══════════════════════════════════════════════════════════
    // Not found
    // ═══════════════════════════════════════════════════════════

    /// API token does not exist.
    #[error("API token not found")]
    TokenNotFound,

    /// Operation is not available under the configured identity model.
    #[error("Operation not supported by the configured identity model")]
    UnsupportedOperation,

    // ═══════════════════════════════════════════════════════════
    // Infrastructure
    // ═══════════════════════════════════════════════════════════

    /// Ephemeral store failure.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Repository failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// WebAuthn engine failure unrelated to the client's response.
    #[error("WebAuthn engine error: {0}")]
    EngineError(String),

    /// Encoding or decoding of a stored record failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Verification code could not be delivered.
    #[error("Failed to deliver verification code: {0}")]
    DeliveryError(String),
}

impl AuthError {
    /// Taxonomy category of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// # use passkey_gate_auth::{AuthError, ErrorKind};
    /// assert_eq!(AuthError::AlreadyRegistered.kind(), ErrorKind::Conflict);
    /// assert_eq!(AuthError::LoginFailed.kind().status_code(), 401);
    /// ```
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_)
            | Self::NoPendingVerification
            | Self::MissingSession
            | Self::SessionExpired
            | Self::RegistrationFailed => ErrorKind::Validation,
            Self::AlreadyRegistered | Self::CredentialAlreadyRegistered => ErrorKind::Conflict,
            Self::CodeMismatch | Self::LoginFailed | Self::Unauthenticated => {
                ErrorKind::Unauthenticated
            }
            Self::TokenNotFound | Self::UnsupportedOperation => ErrorKind::NotFound,
            Self::StorageError(_)
            | Self::DatabaseError(_)
            | Self::EngineError(_)
            | Self::SerializationError(_)
            | Self::DeliveryError(_) => ErrorKind::Infrastructure,
        }
    }

    /// Message safe to return to clients.
    ///
    /// Infrastructure details never cross the boundary.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Infrastructure => "internal error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Returns `true` if retrying the same step may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Infrastructure)
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
