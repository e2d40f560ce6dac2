//! Request extractors for forward-auth style services.
//!
//! - [`CorrelationId`]: the request's correlation ID
//! - [`ClientIp`]: client address as reported by the proxy
//! - [`UserAgent`]: `User-Agent` header
//! - [`BearerToken`]: optional `Authorization: Bearer` secret
//! - [`ForwardedRequest`]: the original request a reverse proxy is asking about
//!
//! All of them are infallible; absent headers produce defaults.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use std::net::{IpAddr, Ipv4Addr};
use uuid::Uuid;

/// Correlation ID for request tracing.
///
/// Prefers the ID stored by [`correlation_id_layer`](crate::correlation_id_layer),
/// then a valid `X-Correlation-ID` header, then a fresh UUID v4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Self>() {
            return Ok(*id);
        }

        let correlation_id = parts
            .headers
            .get(crate::CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// Client IP address.
///
/// # Priority
///
/// 1. `X-Forwarded-For` (first IP in the list)
/// 2. `X-Real-IP`
/// 3. Loopback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(extract_client_ip(&parts.headers)))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn extract_client_ip(headers: &HeaderMap) -> IpAddr {
    header_str(headers, "X-Forwarded-For")
        .and_then(|list| list.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .or_else(|| header_str(headers, "X-Real-IP").and_then(|ip| ip.parse().ok()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// User-Agent header, or "Unknown".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgent(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserAgent
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = header_str(&parts.headers, header::USER_AGENT.as_str())
            .unwrap_or("Unknown")
            .to_string();

        Ok(Self(user_agent))
    }
}

/// Secret from an `Authorization: Bearer <secret>` header, if any.
///
/// The scheme is matched case-insensitively.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct BearerToken(pub Option<String>);

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = if self.0.is_some() { "Some(<redacted>)" } else { "None" };
        f.debug_tuple("BearerToken").field(&shown).finish()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = header_str(&parts.headers, header::AUTHORIZATION.as_str())
            .and_then(|value| value.split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, secret)| secret.trim().to_string())
            .filter(|secret| !secret.is_empty());

        Ok(Self(token))
    }
}

/// The request a reverse proxy forwarded for authorization.
///
/// Built from `X-Forwarded-Proto`, `X-Forwarded-Host` and `X-Forwarded-Uri`,
/// falling back to `http`, the `Host` header and this request's own URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedRequest {
    /// Scheme (`http` or `https`).
    pub scheme: String,
    /// Host, possibly with port.
    pub host: String,
    /// Path and query.
    pub uri: String,
    /// Whether the client accepts HTML, i.e. is a browser navigation.
    pub accepts_html: bool,
}

impl ForwardedRequest {
    /// Reassembled original URL.
    #[must_use]
    pub fn original_url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.uri)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ForwardedRequest
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;

        let scheme = header_str(headers, "X-Forwarded-Proto").unwrap_or("http");
        let host = header_str(headers, "X-Forwarded-Host")
            .or_else(|| header_str(headers, header::HOST.as_str()))
            .unwrap_or_default();
        let uri = header_str(headers, "X-Forwarded-Uri").map_or_else(
            || {
                parts
                    .uri
                    .path_and_query()
                    .map_or_else(|| "/".to_string(), ToString::to_string)
            },
            ToString::to_string,
        );
        let accepts_html =
            header_str(headers, header::ACCEPT.as_str()).is_some_and(|a| a.contains("text/html"));

        Ok(Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            uri,
            accepts_html,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).expect("Valid request").into_parts().0
    }

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let mut parts = parts(Request::builder().header("X-Correlation-ID", uuid.to_string())).await;
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_correlation_id_prefers_extension() {
        let stored = Uuid::new_v4();
        let mut parts = parts(Request::builder().header("X-Correlation-ID", Uuid::new_v4().to_string())).await;
        parts.extensions.insert(CorrelationId(stored));
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(correlation_id.0, stored);
    }

    #[tokio::test]
    async fn test_client_ip_priority() {
        let mut forwarded = parts(
            Request::builder()
                .header("X-Forwarded-For", "203.0.113.1, 198.51.100.1")
                .header("X-Real-IP", "198.51.100.42"),
        )
        .await;
        let ip = ClientIp::from_request_parts(&mut forwarded, &()).await.unwrap();
        assert_eq!(ip.0.to_string(), "203.0.113.1");

        let mut real = parts(Request::builder().header("X-Real-IP", "198.51.100.42")).await;
        let ip = ClientIp::from_request_parts(&mut real, &()).await.unwrap();
        assert_eq!(ip.0.to_string(), "198.51.100.42");

        let mut none = parts(Request::builder()).await;
        let ip = ClientIp::from_request_parts(&mut none, &()).await.unwrap();
        assert_eq!(ip.0, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn test_user_agent_fallback() {
        let mut parts = parts(Request::builder()).await;
        let user_agent = UserAgent::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user_agent.0, "Unknown");
    }

    #[tokio::test]
    async fn test_bearer_token() {
        let mut bearer = parts(Request::builder().header("Authorization", "bearer abc123")).await;
        let token = BearerToken::from_request_parts(&mut bearer, &()).await.unwrap();
        assert_eq!(token.0.as_deref(), Some("abc123"));

        let mut basic = parts(Request::builder().header("Authorization", "Basic dXNlcjpwYXNz")).await;
        let token = BearerToken::from_request_parts(&mut basic, &()).await.unwrap();
        assert_eq!(token.0, None);

        let mut empty = parts(Request::builder().header("Authorization", "Bearer ")).await;
        let token = BearerToken::from_request_parts(&mut empty, &()).await.unwrap();
        assert_eq!(token.0, None);
        assert!(!format!("{token:?}").contains("abc"));
    }

    #[tokio::test]
    async fn test_forwarded_request_from_proxy_headers() {
        let mut parts = parts(
            Request::builder()
                .uri("/api/verify")
                .header("X-Forwarded-Proto", "https")
                .header("X-Forwarded-Host", "app.example.com")
                .header("X-Forwarded-Uri", "/dashboard?tab=1")
                .header("Host", "auth:8081")
                .header("Accept", "text/html,application/xhtml+xml"),
        )
        .await;
        let forwarded = ForwardedRequest::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(forwarded.original_url(), "https://app.example.com/dashboard?tab=1");
        assert!(forwarded.accepts_html);
    }

    #[tokio::test]
    async fn test_forwarded_request_fallbacks() {
        let mut parts = parts(
            Request::builder()
                .uri("/api/verify?x=1")
                .header("Host", "auth.local")
                .header("Accept", "application/json"),
        )
        .await;
        let forwarded = ForwardedRequest::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(forwarded.original_url(), "http://auth.local/api/verify?x=1");
        assert!(!forwarded.accepts_html);
    }
}
