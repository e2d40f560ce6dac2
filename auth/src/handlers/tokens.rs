//! API token management handlers.
//!
//! All routes require a valid `auth_session` cookie
//! ([`AuthenticatedSession`]).
//!
//! ```text
//! GET    /api/tokens          → [{id, name, created_at}]
//! POST   /api/tokens {name}   → 201 {id, name, created_at, token}
//! PATCH  /api/tokens/:id {name} → {id, name, created_at}
//! DELETE /api/tokens/:id      → 204
//! ```

use super::session::AuthenticatedSession;
use super::{json_body, SharedEnvironment};
use crate::providers::{ApiTokenRecord, CodeSender, EphemeralStore, IdentityRepository, WebAuthnProvider};
use crate::tokens::CreatedToken;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use passkey_gate_web::AppError;
use serde::Deserialize;
use uuid::Uuid;

/// Body of token create and rename.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenNameRequest {
    /// Token name.
    #[serde(default)]
    pub name: String,
}

fn parse_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::bad_request("invalid token id"))
}

/// List tokens.
///
/// # Errors
///
/// 401 without a session, 500 on repository failure.
pub async fn list<S, R, W, M>(
    State(env): State<SharedEnvironment<S, R, W, M>>,
    _session: AuthenticatedSession,
) -> Result<Json<Vec<ApiTokenRecord>>, AppError>
where
    S: EphemeralStore + 'static,
    R: IdentityRepository + 'static,
    W: WebAuthnProvider + 'static,
    M: CodeSender + 'static,
{
    Ok(Json(env.tokens().list().await?))
}

/// Create a token. The secret is only ever returned here.
///
/// # Errors
///
/// 400 for a bad name, 401 without a session.
pub async fn create<S, R, W, M>(
    State(env): State<SharedEnvironment<S, R, W, M>>,
    AuthenticatedSession(claims): AuthenticatedSession,
    body: Result<Json<TokenNameRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedToken>), AppError>
where
    S: EphemeralStore + 'static,
    R: IdentityRepository + 'static,
    W: WebAuthnProvider + 'static,
    M: CodeSender + 'static,
{
    let request = json_body(body)?;
    let created = env.tokens().create(&request.name).await?;
    tracing::info!(created_by = %claims.subject(), token_id = %created.record.id, "API token issued");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Rename a token.
///
/// # Errors
///
/// 400 for a bad ID or name, 401 without a session, 404 for an unknown token.
pub async fn rename<S, R, W, M>(
    State(env): State<SharedEnvironment<S, R, W, M>>,
    _session: AuthenticatedSession,
    Path(id): Path<String>,
    body: Result<Json<TokenNameRequest>, JsonRejection>,
) -> Result<Json<ApiTokenRecord>, AppError>
where
    S: EphemeralStore + 'static,
    R: IdentityRepository + 'static,
    W: WebAuthnProvider + 'static,
    M: CodeSender + 'static,
{
    let id = parse_id(&id)?;
    let request = json_body(body)?;
    Ok(Json(env.tokens().rename(id, &request.name).await?))
}

/// Delete a token.
///
/// # Errors
///
/// 400 for a bad ID, 401 without a session, 404 for an unknown token.
pub async fn delete<S, R, W, M>(
    State(env): State<SharedEnvironment<S, R, W, M>>,
    _session: AuthenticatedSession,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError>
where
    S: EphemeralStore + 'static,
    R: IdentityRepository + 'static,
    W: WebAuthnProvider + 'static,
    M: CodeSender + 'static,
{
    env.tokens().delete(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
