//! HTTP handlers for the passkey gate.
//!
//! Handlers are thin: they pull cookies and bodies out of the request, call
//! the orchestrator, session issuer or token manager on the shared
//! [`AuthEnvironment`], and turn the result into JSON, cookies and headers.
//! Every [`AuthError`] becomes an [`AppError`] with the status of its
//! [`ErrorKind`](crate::error::ErrorKind).

pub mod cookies;
pub mod login;
pub mod registration;
pub mod session;
pub mod tokens;

use crate::environment::AuthEnvironment;
use crate::error::{AuthError, ErrorKind};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    Json,
};
use passkey_gate_web::AppError;
use std::sync::Arc;

/// State shared by every auth handler.
pub type SharedEnvironment<S, R, W, M> = Arc<AuthEnvironment<S, R, W, M>>;

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let kind = err.kind();
        let status =
            StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let app_error = Self::new(status, err.public_message(), kind.code().to_string());

        match kind {
            ErrorKind::Infrastructure => app_error.with_source(anyhow::Error::new(err)),
            _ => app_error,
        }
    }
}

/// Unwrap a JSON body, answering 400 for anything malformed.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        AppError::bad_request("invalid request body")
    })
}
