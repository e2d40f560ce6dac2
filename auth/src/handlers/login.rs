//! Discoverable login handlers.

use super::cookies::{ceremony_cookie, cleared_cookie, cookie_value, session_cookie, CEREMONY_COOKIE};
use super::registration::StatusResponse;
use super::{json_body, SharedEnvironment};
use crate::providers::{CodeSender, EphemeralStore, IdentityRepository, WebAuthnProvider};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use passkey_gate_web::{AppError, ClientIp, UserAgent};
use serde_json::Value;

/// Begin a login ceremony.
///
/// ```text
/// POST /api/login/begin
/// ```
///
/// Returns options for `navigator.credentials.get()` with an empty
/// `allowCredentials` list and sets the `webauthn_session` cookie.
///
/// # Errors
///
/// 500 if the engine or store fails.
pub async fn begin<S, R, W, M>(
    State(env): State<SharedEnvironment<S, R, W, M>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>), AppError>
where
    S: EphemeralStore + 'static,
    R: IdentityRepository + 'static,
    W: WebAuthnProvider + 'static,
    M: CodeSender + 'static,
{
    let start = env.ceremonies().begin_login().await?;
    let jar = jar.add(ceremony_cookie(start.session_id, &env.config.cookies));
    Ok((jar, Json(start.options)))
}

/// Finish a login ceremony.
///
/// ```text
/// POST /api/login/finish
/// Cookie: webauthn_session=...
///
/// <PublicKeyCredential JSON>
/// ```
///
/// # Errors
///
/// - 400: missing or expired ceremony
/// - 401: unknown credential, bad signature, counter regression
///
/// The ceremony cookie is cleared whether or not verification succeeds.
pub async fn finish<S, R, W, M>(
    State(env): State<SharedEnvironment<S, R, W, M>>,
    client_ip: ClientIp,
    user_agent: UserAgent,
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
        .finish_login(session_id.as_deref(), &response)
        .await
    {
        Ok(issued) => issued,
        Err(e) => {
            tracing::info!(
                ip = %client_ip.0,
                user_agent = %user_agent.0,
                error = %e,
                "Login rejected"
            );
            return Err((jar, e.into()));
        }
    };

    let jar = jar.add(session_cookie(issued.token, env.config.session.ttl, cookies));

    Ok((jar, Json(StatusResponse { status: "authenticated" })))
}
