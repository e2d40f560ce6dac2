//! In-memory test doubles for every capability trait.
//!
//! These implementations are deterministic and never touch the network, so
//! the orchestrator, session issuer and HTTP router can be exercised end to
//! end in unit and integration tests.

pub mod code_sender;
pub mod ephemeral_store;
pub mod repository;
pub mod webauthn;

pub use code_sender::{RecordingCodeSender, SentCode};
pub use ephemeral_store::MemoryEphemeralStore;
pub use repository::MockIdentityRepository;
pub use webauthn::{MockAuthenticator, MockWebAuthnProvider};
