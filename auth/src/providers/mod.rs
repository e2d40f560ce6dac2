//! Capability traits and their production implementations.
//!
//! Everything the ceremony orchestrator, session issuer and token manager
//! touch outside of process memory sits behind one of these traits:
//!
//! - [`EphemeralStore`]: TTL-keyed state (codes, challenges, sessions)
//! - [`IdentityRepository`]: durable users, credentials, API tokens
//! - [`WebAuthnProvider`]: the ceremony engine
//! - [`CredentialResolver`]: credential lookup during discoverable login
//! - [`CodeSender`]: verification code delivery
//!
//! Tests swap in the in-memory versions from [`crate::mocks`].

pub mod console_email;
pub mod email;
pub mod ephemeral_store;
pub mod repository;
pub mod smtp_email;
pub mod webauthn;
pub mod webauthn_rs;

pub use console_email::ConsoleCodeSender;
pub use email::CodeSender;
pub use ephemeral_store::{EphemeralStore, Namespace};
pub use repository::{ApiTokenRecord, IdentityRepository};
pub use smtp_email::SmtpCodeSender;
pub use webauthn::{
    CeremonyChallenge, CredentialResolver, ResolvedCredential, VerifiedAssertion,
    WebAuthnProvider,
};
pub use webauthn_rs::WebauthnRsProvider;
