//! Shared fixtures for the integration suites.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use passkey_gate_auth::{
    auth_router,
    mocks::{MemoryEphemeralStore, MockIdentityRepository, MockWebAuthnProvider, RecordingCodeSender},
    AuthConfig, AuthEnvironment, IdentityModel, PasskeyConfig,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

/// Environment type used by every test.
pub type TestEnvironment = AuthEnvironment<
    MemoryEphemeralStore,
    MockIdentityRepository,
    MockWebAuthnProvider,
    RecordingCodeSender,
>;

/// Configuration for `http://localhost:8081`.
pub fn config(model: IdentityModel) -> AuthConfig {
    AuthConfig::new(PasskeyConfig::new(
        "http://localhost:8081".to_string(),
        "localhost".to_string(),
    ))
    .with_identity_model(model)
}

/// Environment plus handles onto its in-memory collaborators.
pub struct Harness {
    pub env: Arc<TestEnvironment>,
    pub store: MemoryEphemeralStore,
    pub repository: MockIdentityRepository,
    pub codes: RecordingCodeSender,
}

impl Harness {
    pub fn new(config: AuthConfig) -> Self {
        let store = MemoryEphemeralStore::new();
        let repository = MockIdentityRepository::new();
        let codes = RecordingCodeSender::new();
        let env = Arc::new(AuthEnvironment::new(
            store.clone(),
            repository.clone(),
            MockWebAuthnProvider::new(),
            codes.clone(),
            config,
        ));

        Self {
            env,
            store,
            repository,
            codes,
        }
    }

    pub fn email() -> Self {
        Self::new(config(IdentityModel::EmailVerified))
    }

    pub fn credential() -> Self {
        Self::new(config(IdentityModel::CredentialIsIdentity))
    }

    pub fn client(&self) -> Client {
        Client {
            router: auth_router(Arc::clone(&self.env)),
            cookies: HashMap::new(),
        }
    }
}

/// Minimal browser: remembers cookies between requests.
pub struct Client {
    router: Router,
    pub cookies: HashMap<String, String>,
}

/// A response with its body already read.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn set_cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|c| c.starts_with(&format!("{name}=")))
            .map(ToString::to_string)
    }
}

impl Client {
    pub async fn send(&mut self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        self.absorb(response).await
    }

    pub fn request(&self, method: Method, uri: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie);
        }
        builder
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let request = self.request(Method::GET, uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post(&mut self, uri: &str, body: &Value) -> TestResponse {
        self.json(Method::POST, uri, body).await
    }

    pub async fn json(&mut self, method: Method, uri: &str, body: &Value) -> TestResponse {
        let request = self
            .request(method, uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn delete(&mut self, uri: &str) -> TestResponse {
        let request = self.request(Method::DELETE, uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn absorb(&mut self, response: Response) -> TestResponse {
        let status = response.status();
        let headers = response.headers().clone();

        for value in headers.get_all(header::SET_COOKIE) {
            let value = value.to_str().unwrap();
            let pair = value.split(';').next().unwrap();
            let (name, cookie_value) = pair.split_once('=').unwrap();
            if cookie_value.is_empty() || value.contains("Max-Age=0") {
                self.cookies.remove(name);
            } else {
                self.cookies.insert(name.to_string(), cookie_value.to_string());
            }
        }

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}
