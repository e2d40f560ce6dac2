//! Registration handlers.
//!
//! ```text
//! email model:       POST /api/register/begin  {email}         → {"status":"code_sent"}
//!                    POST /api/register/verify {email, code}   → options + webauthn_session
//!                    POST /api/register/finish <attestation>   → {"status":"registered"} + auth_session
//!
//! credential model:  POST /api/register/begin  {display_name}  → options + webauthn_session
//!                    POST /api/register/finish <attestation>   → {"status":"registered"} + auth_session
//! ```

use super::cookies::{ceremony_cookie, cleared_cookie, cookie_value, session_cookie, CEREMONY_COOKIE};
use super::{json_body, SharedEnvironment};
use crate::config::IdentityModel;
use crate::providers::{CodeSender, EphemeralStore, IdentityRepository, WebAuthnProvider};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use passkey_gate_web::{AppError, CorrelationId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/register/begin`.
///
/// `email` is read under the email model, `display_name` under the
/// credential model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BeginRegistrationRequest {
    /// Email to verify.
    #[serde(default)]
    pub email: Option<String>,
    /// Name for a credential-as-identity account.
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Body of `POST /api/register/verify`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyCodeRequest {
    /// Email the code was sent to.
    pub email: String,
    /// Six-digit code.
    pub code: String,
}

/// Outcome marker returned by steps with nothing else to say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    /// `code_sent`, `registered` or `authenticated`.
    pub status: &'static str,
}

/// Begin registration.
///
/// # Errors
///
/// - 400: missing or malformed email / display name
/// - 409: email already registered
/// - 500: store, repository or mailer failure
pub async fn begin<S, R, W, M>(
    State(env): State<SharedEnvironment<S, R, W, M>>,
    correlation_id: CorrelationId,
    jar: CookieJar,
    body: Result<Json<BeginRegistrationRequest>, JsonRejection>,
) -> Result<Response, AppError>
where
    S: EphemeralStore + 'static,
    R: IdentityRepository + 'static,
    W: WebAuthnProvider + 'static,
    M: CodeSender + 'static,
{
    let request = json_body(body)?;
    tracing::debug!(correlation_id = %correlation_id.0, "Registration begin");

    match env.config.identity_model {
        IdentityModel::EmailVerified => {
            let email = request
                .email
                .filter(|e| !e.trim().is_empty())
                .ok_or_else(|| AppError::bad_request("email is required"))?;

            env.ceremonies().begin_registration(&email).await?;
            Ok(Json(StatusResponse { status: "code_sent" }).into_response())
        }
        IdentityModel::CredentialIsIdentity => {
            let display_name = request.display_name.unwrap_or_default();
            let start = env
                .ceremonies()
                .begin_credential_registration(&display_name)
                .await?;

            let jar = jar.add(ceremony_cookie(start.session_id, &env.config.cookies));
            Ok((jar, Json(start.options)).into_response())
        }
    }
}

/// Check the emailed code and begin the `WebAuthn` ceremony.
///
/// # Errors
///
/// - 400: malformed body, or no pending code
/// - 401: wrong code
/// - 404: credential-as-identity deployment
pub async fn verify<S, R, W, M>(
    State(env): State<SharedEnvironment<S, R, W, M>>,
    jar: CookieJar,
    body: Result<Json<VerifyCodeRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<Value>), AppError>
where
    S: EphemeralStore + 'static,
    R: IdentityRepository + 'static,
    W: WebAuthnProvider + 'static,
    M: CodeSender + 'static,
{
    let request = json_body(body)?;
    let start = env
        .ceremonies()
        .verify_code(&request.email, request.code.trim())
        .await?;

    let jar = jar.add(ceremony_cookie(start.session_id, &env.config.cookies));
    Ok((jar, Json(start.options)))
}

/// Verify the attestation, store the credential and sign the caller in.
///
/// # Errors
///
/// - 400: missing or expired ceremony, rejected attestation
/// - 409: credential already registered
///
/// The ceremony cookie is cleared whether or not verification succeeds.
pub async fn finish<S, R, W, M>(
    State(env): State<SharedEnvironment<S, R, W, M>>,
    jar: CookieJar,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(CookieJar, Json<StatusResponse>), (CookieJar, AppError)>
where
    S: EphemeralStore + 'static,
    R: IdentityRepository + 'static,
    W: WebAuthnProvider + 'static,
    M: CodeSender + 'static,
{
    let session_id = cookie_value(&jar, CEREMONY_COOKIE).map(ToString::to_string);
    let response = match json_body(body) {
        Ok(response) => response,
        Err(e) => return Err((jar, e)),
    };

    let cookies = &env.config.cookies;
    let jar = jar.add(cleared_cookie(CEREMONY_COOKIE, cookies));
    let issued = match env
        .ceremonies()
        .finish_registration(session_id.as_deref(), &response)
        .await
    {
        Ok(issued) => issued,
        Err(e) => return Err((jar, e.into())),
    };

    let jar = jar.add(session_cookie(issued.token, env.config.session.ttl, cookies));

    Ok((jar, Json(StatusResponse { status: "registered" })))
}
