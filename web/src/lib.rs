//! Axum plumbing shared by the passkey gate services.
//!
//! - [`AppError`]: JSON error responses with server-side logging
//! - Extractors for correlation IDs, client IPs, bearer tokens and the
//!   original request behind a forward-auth call
//! - [`correlation_id_layer`]: per-request tracing span and response header
//! - [`handlers::health_check`]: liveness probe

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{BearerToken, ClientIp, CorrelationId, ForwardedRequest, UserAgent};
pub use middleware::{correlation_id_layer, CorrelationIdExt, CORRELATION_ID_HEADER};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
