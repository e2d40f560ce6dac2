//! Authentication router composition.

use crate::environment::AuthEnvironment;
use crate::handlers::{login, registration, session, tokens};
use crate::providers::{CodeSender, EphemeralStore, IdentityRepository, WebAuthnProvider};
use axum::{
    routing::{get, patch, post},
    Router,
};
use passkey_gate_web::handlers::health_check;
use std::sync::Arc;

/// Create the passkey gate router.
///
/// # Routes
///
/// ## Registration
/// - `POST /api/register/begin` - Send a code, or begin a credential-account ceremony
/// - `POST /api/register/verify` - Check the code, begin the ceremony
/// - `POST /api/register/finish` - Store the passkey, sign in
///
/// ## Login
/// - `POST /api/login/begin` - Begin a discoverable login
/// - `POST /api/login/finish` - Verify the assertion, sign in
///
/// ## Session
/// - `GET /api/verify` - Forward-auth introspection
/// - `GET /api/network` - Network context reported by the proxy
/// - `POST /api/logout` - End the session
///
/// ## API tokens
/// - `GET /api/tokens`, `POST /api/tokens`
/// - `PATCH /api/tokens/:id`, `DELETE /api/tokens/:id`
///
/// ## Health
/// - `GET /health`
///
/// # Example
///
/// ```rust,ignore
/// let env = Arc::new(AuthEnvironment::new(store, repository, webauthn, codes, config));
///
/// let app = auth_router(env)
///     .layer(correlation_id_layer())
///     .layer(TraceLayer::new_for_http());
/// ```
pub fn auth_router<S, R, W, M>(env: Arc<AuthEnvironment<S, R, W, M>>) -> Router
where
    S: EphemeralStore + 'static,
    R: IdentityRepository + 'static,
    W: WebAuthnProvider + 'static,
    M: CodeSender + 'static,
{
    Router::new()
        .route("/api/register/begin", post(registration::begin::<S, R, W, M>))
        .route("/api/register/verify", post(registration::verify::<S, R, W, M>))
        .route("/api/register/finish", post(registration::finish::<S, R, W, M>))
        .route("/api/login/begin", post(login::begin::<S, R, W, M>))
        .route("/api/login/finish", post(login::finish::<S, R, W, M>))
        .route("/api/verify", get(session::verify::<S, R, W, M>))
        .route("/api/network", get(session::network))
        .route("/api/logout", post(session::logout::<S, R, W, M>))
        .route(
            "/api/tokens",
            get(tokens::list::<S, R, W, M>).post(tokens::create::<S, R, W, M>),
        )
        .route(
            "/api/tokens/:id",
            patch(tokens::rename::<S, R, W, M>).delete(tokens::delete::<S, R, W, M>),
        )
        .route("/health", get(health_check))
        .with_state(env)
}
