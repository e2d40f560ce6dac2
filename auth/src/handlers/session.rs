//! Forward-auth introspection, network context, logout and the session guard.

use super::cookies::{cleared_cookie, cookie_value, SESSION_COOKIE};
use super::SharedEnvironment;
use crate::config::CookieConfig;
use crate::error::AuthError;
use crate::principal::SessionClaims;
use crate::providers::{CodeSender, EphemeralStore, IdentityRepository, WebAuthnProvider};
use crate::session::Identity;
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use passkey_gate_web::{AppError, BearerToken, ForwardedRequest};
use serde::Serialize;

/// Authenticated user ID, credential handle or `token:<id>`.
pub const AUTH_USER_HEADER: &str = "x-auth-user";
/// Email, display name or token name.
pub const AUTH_NAME_HEADER: &str = "x-auth-name";
/// Email, email model only.
pub const AUTH_EMAIL_HEADER: &str = "x-auth-email";
/// `session` or `api_token`.
pub const AUTH_METHOD_HEADER: &str = "x-auth-method";
/// Network context injected by the reverse proxy.
pub const NETWORK_CONTEXT_HEADER: &str = "x-network-context";

/// Forward-auth check.
///
/// ```text
/// GET /api/verify
/// Cookie: auth_session=...        (or)
/// Authorization: Bearer <api token>
/// ```
///
/// 200 with identity headers on success. Otherwise a 302 to the login page
/// for browser navigations when one is configured, or a bare 401.
///
/// # Errors
///
/// 500 if the store or repository fails.
pub async fn verify<S, R, W, M>(
    State(env): State<SharedEnvironment<S, R, W, M>>,
    jar: CookieJar,
    BearerToken(bearer): BearerToken,
    forwarded: ForwardedRequest,
) -> Result<Response, AppError>
where
    S: EphemeralStore + 'static,
    R: IdentityRepository + 'static,
    W: WebAuthnProvider + 'static,
    M: CodeSender + 'static,
{
    let cookie = cookie_value(&jar, SESSION_COOKIE);

    match env.sessions().introspect(cookie, bearer.as_deref()).await {
        Ok(identity) => Ok((StatusCode::OK, identity_headers(&identity)).into_response()),
        Err(AuthError::Unauthenticated) => Ok(unauthenticated(&env.config.cookies, &forwarded)),
        Err(e) => Err(e.into()),
    }
}

/// Identity headers for a successful introspection.
///
/// Values that are not valid header bytes are dropped.
#[must_use]
pub fn identity_headers(identity: &Identity) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let mut set = |name: &'static str, value: &str| {
        if let Ok(value) = HeaderValue::from_bytes(value.as_bytes()) {
            headers.insert(HeaderName::from_static(name), value);
        }
    };

    match identity {
        Identity::Session(claims) => {
            set(AUTH_USER_HEADER, &claims.subject());
            set(AUTH_NAME_HEADER, claims.name());
            if let Some(email) = claims.email() {
                set(AUTH_EMAIL_HEADER, email);
            }
            set(AUTH_METHOD_HEADER, "session");
        }
        Identity::ApiToken(token) => {
            set(AUTH_USER_HEADER, &format!("token:{}", token.id));
            set(AUTH_NAME_HEADER, &token.name);
            set(AUTH_METHOD_HEADER, "api_token");
        }
    }

    headers
}

/// Login page URL carrying `original` as `redirect_uri`.
#[must_use]
pub fn login_redirect_url(login_url: &str, original: &str) -> String {
    let separator = if login_url.contains('?') { '&' } else { '?' };
    format!(
        "{login_url}{separator}redirect_uri={}",
        urlencoding::encode(original)
    )
}

fn unauthenticated(config: &CookieConfig, forwarded: &ForwardedRequest) -> Response {
    if let Some(login_url) = config.login_url.as_deref().filter(|_| forwarded.accepts_html) {
        let location = login_redirect_url(login_url, &forwarded.original_url());
        if let Ok(location) = HeaderValue::from_str(&location) {
            return (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
        }
        tracing::warn!("Login redirect target is not a valid header value");
    }

    AppError::from(AuthError::Unauthenticated).into_response()
}

/// Network context response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkResponse {
    /// `local` or `public`.
    pub network: &'static str,
}

/// Report whether the proxy saw the request on the local network.
///
/// ```text
/// GET /api/network
/// X-Network-Context: local
/// ```
///
/// Anything other than exactly `local` is `public`.
#[allow(clippy::unused_async)]
pub async fn network(headers: HeaderMap) -> Json<NetworkResponse> {
    let local = headers
        .get(NETWORK_CONTEXT_HEADER)
        .is_some_and(|v| v.as_bytes() == b"local");

    Json(NetworkResponse {
        network: if local { "local" } else { "public" },
    })
}

/// End the caller's session and clear its cookie.
///
/// ```text
/// POST /api/logout
/// ```
///
/// Always 204, whether or not a session existed.
///
/// # Errors
///
/// 500 if the store fails.
pub async fn logout<S, R, W, M>(
    State(env): State<SharedEnvironment<S, R, W, M>>,
    jar: CookieJar,
) -> Result<(StatusCode, CookieJar), AppError>
where
    S: EphemeralStore + 'static,
    R: IdentityRepository + 'static,
    W: WebAuthnProvider + 'static,
    M: CodeSender + 'static,
{
    env.sessions()
        .logout(cookie_value(&jar, SESSION_COOKIE))
        .await?;

    let jar = jar.add(cleared_cookie(SESSION_COOKIE, &env.config.cookies));
    Ok((StatusCode::NO_CONTENT, jar))
}

/// Extractor requiring a valid `auth_session` cookie.
///
/// Validation slides the session window. Rejects with 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession(pub SessionClaims);

#[async_trait]
impl<S, R, W, M> FromRequestParts<SharedEnvironment<S, R, W, M>> for AuthenticatedSession
where
    S: EphemeralStore + 'static,
    R: IdentityRepository + 'static,
    W: WebAuthnProvider + 'static,
    M: CodeSender + 'static,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        env: &SharedEnvironment<S, R, W, M>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = cookie_value(&jar, SESSION_COOKIE).ok_or(AuthError::Unauthenticated)?;
        let claims = env.sessions().validate(token).await?;
        Ok(Self(claims))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::providers::ApiTokenRecord;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_session_identity_headers() {
        let user_id = Uuid::new_v4();
        let headers = identity_headers(&Identity::Session(SessionClaims::User {
            user_id,
            email: "alice@example.com".into(),
        }));

        assert_eq!(headers[AUTH_USER_HEADER], user_id.to_string().as_str());
        assert_eq!(headers[AUTH_NAME_HEADER], "alice@example.com");
        assert_eq!(headers[AUTH_EMAIL_HEADER], "alice@example.com");
        assert_eq!(headers[AUTH_METHOD_HEADER], "session");
    }

    #[test]
    fn test_credential_identity_has_no_email() {
        let headers = identity_headers(&Identity::Session(SessionClaims::Credential {
            handle: Uuid::new_v4(),
            display_name: "Küchen-Tablet".into(),
        }));

        assert!(headers.get(AUTH_EMAIL_HEADER).is_none());
        assert_eq!(
            headers[AUTH_NAME_HEADER].as_bytes(),
            "Küchen-Tablet".as_bytes()
        );
    }

    #[test]
    fn test_token_identity_headers() {
        let id = Uuid::new_v4();
        let headers = identity_headers(&Identity::ApiToken(ApiTokenRecord {
            id,
            name: "ci".into(),
            created_at: Utc::now(),
        }));

        assert_eq!(headers[AUTH_USER_HEADER], format!("token:{id}").as_str());
        assert_eq!(headers[AUTH_METHOD_HEADER], "api_token");
    }

    #[test]
    fn test_login_redirect_url() {
        assert_eq!(
            login_redirect_url("https://auth.example.com/login", "https://app.example.com/a?b=1"),
            "https://auth.example.com/login?redirect_uri=https%3A%2F%2Fapp.example.com%2Fa%3Fb%3D1"
        );
        assert_eq!(
            login_redirect_url("/login?theme=dark", "http://x/"),
            "/login?theme=dark&redirect_uri=http%3A%2F%2Fx%2F"
        );
    }

    #[tokio::test]
    async fn test_network_context() {
        let mut headers = HeaderMap::new();
        assert_eq!(network(headers.clone()).await.0.network, "public");

        headers.insert(NETWORK_CONTEXT_HEADER, HeaderValue::from_static("local"));
        assert_eq!(network(headers.clone()).await.0.network, "local");

        headers.insert(NETWORK_CONTEXT_HEADER, HeaderValue::from_static("LAN"));
        assert_eq!(network(headers).await.0.network, "public");
    }
}
