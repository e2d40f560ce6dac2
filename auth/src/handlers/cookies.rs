//! Cookie construction.
//!
//! Two cookies exist:
//!
//! - `webauthn_session`: ceremony session ID between a begin and a finish step
//! - `auth_session`: authenticated session token
//!
//! Both are `HttpOnly`, `SameSite=Lax`, scoped to `/`, and `Secure` when the
//! relying-party origin is HTTPS.

use crate::config::CookieConfig;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

/// Authenticated session cookie name.
pub const SESSION_COOKIE: &str = "auth_session";

/// Ceremony session cookie name.
pub const CEREMONY_COOKIE: &str = "webauthn_session";

/// Ceremony cookie lifetime, matching the challenge TTL.
pub const CEREMONY_COOKIE_MAX_AGE: Duration = Duration::seconds(300);

fn build(name: &'static str, value: String, max_age: Duration, config: &CookieConfig) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure)
        .max_age(max_age)
        .build()
}

/// Cookie carrying an authenticated session token.
#[must_use]
pub fn session_cookie(token: String, ttl: chrono::Duration, config: &CookieConfig) -> Cookie<'static> {
    build(SESSION_COOKIE, token, Duration::seconds(ttl.num_seconds()), config)
}

/// Cookie carrying a ceremony session ID.
#[must_use]
pub fn ceremony_cookie(session_id: String, config: &CookieConfig) -> Cookie<'static> {
    build(CEREMONY_COOKIE, session_id, CEREMONY_COOKIE_MAX_AGE, config)
}

/// Expired, empty cookie that makes the browser drop `name`.
#[must_use]
pub fn cleared_cookie(name: &'static str, config: &CookieConfig) -> Cookie<'static> {
    build(name, String::new(), Duration::ZERO, config)
}

/// Value of a cookie, if present and non-empty.
#[must_use]
pub fn cookie_value<'a>(jar: &'a CookieJar, name: &str) -> Option<&'a str> {
    jar.get(name).map(Cookie::value).filter(|v| !v.is_empty())
}
