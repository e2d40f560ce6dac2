//! Storage implementations.
//!
//! - **Ephemeral store** (Redis): verification codes, ceremony challenges,
//!   registration sessions and authenticated sessions, all TTL-bound
//! - **State facade**: typed records and namespaces over any ephemeral store
//! - **Identity repository** (PostgreSQL): users, credentials, API tokens

#[cfg(feature = "postgres")]
pub mod postgres;
pub mod redis_ephemeral;
pub mod state;

// Re-exports
#[cfg(feature = "postgres")]
pub use postgres::PostgresIdentityRepository;
pub use redis_ephemeral::RedisEphemeralStore;
pub use state::{
    AuthSessionRecord, CeremonyPurpose, ChallengeSession, RegistrationSession, StateStore,
    VerificationRecord,
};
