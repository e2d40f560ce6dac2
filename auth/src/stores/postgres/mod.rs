//! PostgreSQL storage for users, credentials and API tokens.

pub mod repository;

pub use repository::PostgresIdentityRepository;
