//! # Passkey Gate Authentication
//!
//! Passkey (`WebAuthn`) registration and login, sliding authenticated
//! sessions and static API tokens for a reverse proxy's forward-auth check.
//!
//! ## Features
//!
//! - **Passwordless**: discoverable passkeys only; no passwords, no usernames at login
//! - **Two identity models**: email-verified users, or one account per credential
//! - **Single-use ceremonies**: challenges are taken out of the store before verification
//! - **Forward auth**: `GET /api/verify` answers with identity headers, a login redirect or 401
//! - **Testable**: every collaborator sits behind a trait with an in-memory double
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────────────────┐
//!   HTTP handlers ──►│      AuthEnvironment     │
//!                    │  ceremonies()            │──► WebAuthnProvider
//!                    │  sessions()              │──► StateStore<EphemeralStore> (Redis)
//!                    │  tokens()                │──► IdentityRepository (PostgreSQL)
//!                    └──────────────────────────┘──► CodeSender (SMTP / console)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use passkey_gate_auth::*;
//!
//! let env = AuthEnvironment::new(store, repository, webauthn, codes, config);
//!
//! env.ceremonies().begin_registration("alice@example.com").await?;
//! let start = env.ceremonies().verify_code("alice@example.com", "123456").await?;
//! // browser runs navigator.credentials.create(start.options)
//! let session = env.ceremonies().finish_registration(Some(&start.session_id), &response).await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod ceremony;
pub mod config;
pub mod credential;
pub mod environment;
pub mod error;
pub mod principal;
pub mod providers;
pub mod session;
pub mod stores;
pub mod tokens;
pub mod utils;

#[cfg(feature = "axum")]
pub mod handlers;
#[cfg(feature = "axum")]
pub mod router;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use ceremony::{CeremonyOrchestrator, CeremonyStart, RepositoryResolver};
pub use config::{
    AuthConfig, CookieConfig, IdentityModel, PasskeyConfig, SessionConfig, VerificationConfig,
};
pub use credential::{CredentialOwner, CredentialUsage, RegisteredCredential, StoredCredential};
pub use environment::AuthEnvironment;
pub use error::{AuthError, ErrorKind, Result};
pub use principal::{CredentialAccount, Principal, SessionClaims, UserAccount};
pub use session::{Identity, IssuedSession, SessionIssuer};
pub use tokens::{ApiTokenManager, CreatedToken};

#[cfg(feature = "axum")]
pub use router::auth_router;
