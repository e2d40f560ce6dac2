//! Mock `WebAuthn` engine and software authenticator for testing.
//!
//! The wire shapes are simplified JSON rather than CBOR/COSE, but the checks
//! mirror a real engine: challenge binding, user-handle binding on
//! registration, a signature over the challenge tied to the stored public key,
//! and signature counter monotonicity.
//!
//! "Signature" here is `base64url(SHA-256(challenge || public_key))`; it proves
//! the response was built for this challenge by the holder of this key.

use crate::credential::{check_sign_count, CredentialUsage, RegisteredCredential};
use crate::error::{AuthError, Result};
use crate::principal::Principal;
use crate::providers::webauthn::{
    CeremonyChallenge, CredentialResolver, VerifiedAssertion, WebAuthnProvider,
};
use crate::utils::generate_secret;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Mock `WebAuthn` provider.
///
/// Stateless like the real engine: everything travels in the ceremony state.
#[derive(Debug, Clone)]
pub struct MockWebAuthnProvider {
    rp_id: String,
}

impl MockWebAuthnProvider {
    /// Create a new mock `WebAuthn` provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rp_id: "localhost".into(),
        }
    }
}

impl Default for MockWebAuthnProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct RegistrationState {
    challenge: String,
    handle: Uuid,
    #[serde(default)]
    exclude: Vec<String>,
}

#[derive(Deserialize)]
struct LoginState {
    challenge: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttestationBody {
    challenge: String,
    public_key: String,
    user_handle: Uuid,
    #[serde(default)]
    transports: Vec<String>,
    #[serde(default)]
    sign_count: u32,
    #[serde(default)]
    aaguid: Option<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssertionBody {
    challenge: String,
    user_handle: Uuid,
    signature: String,
    sign_count: u32,
}

#[derive(Deserialize)]
struct ClientResponse<T> {
    id: String,
    response: T,
}

fn engine_state(public_key: &[u8], counter: u32) -> Value {
    json!({ "public_key": URL_SAFE_NO_PAD.encode(public_key), "counter": counter })
}

impl WebAuthnProvider for MockWebAuthnProvider {
    async fn begin_registration(&self, principal: &Principal) -> Result<CeremonyChallenge> {
        let challenge = generate_secret();
        let exclude: Vec<String> = principal
            .credentials()
            .iter()
            .map(|c| URL_SAFE_NO_PAD.encode(&c.credential_id))
            .collect();

        let options = json!({
            "publicKey": {
                "rp": { "id": self.rp_id, "name": "Auth" },
                "user": {
                    "id": principal.handle(),
                    "name": principal.name(),
                    "displayName": principal.display_name(),
                },
                "challenge": challenge,
                "excludeCredentials": exclude.iter().map(|id| json!({ "type": "public-key", "id": id })).collect::<Vec<_>>(),
                "authenticatorSelection": { "residentKey": "required", "requireResidentKey": true },
            }
        });
        let state = json!({
            "challenge": challenge,
            "handle": principal.handle(),
            "exclude": exclude,
        });

        Ok(CeremonyChallenge { options, state })
    }

    async fn finish_registration(
        &self,
        principal: &Principal,
        state: &Value,
        response: &Value,
    ) -> Result<RegisteredCredential> {
        let state: RegistrationState =
            serde_json::from_value(state.clone()).map_err(|_| AuthError::SessionExpired)?;
        let response: ClientResponse<AttestationBody> = serde_json::from_value(response.clone())
            .map_err(|_| AuthError::RegistrationFailed)?;

        let body = &response.response;
        if body.challenge != state.challenge
            || body.user_handle != state.handle
            || state.handle != principal.handle()
            || state.exclude.contains(&response.id)
        {
            tracing::warn!(handle = %state.handle, "Mock attestation rejected");
            return Err(AuthError::RegistrationFailed);
        }

        let credential_id = URL_SAFE_NO_PAD
            .decode(&response.id)
            .map_err(|_| AuthError::RegistrationFailed)?;
        let public_key = URL_SAFE_NO_PAD
            .decode(&body.public_key)
            .map_err(|_| AuthError::RegistrationFailed)?;

        Ok(RegisteredCredential {
            credential_id,
            engine_state: engine_state(&public_key, body.sign_count),
            public_key,
            transports: body.transports.clone(),
            sign_count: body.sign_count,
            backup_eligible: true,
            backup_state: false,
            aaguid: body.aaguid.unwrap_or_else(Uuid::nil),
        })
    }

    async fn begin_discoverable_login(&self) -> Result<CeremonyChallenge> {
        let challenge = generate_secret();
        Ok(CeremonyChallenge {
            options: json!({
                "publicKey": {
                    "rpId": self.rp_id,
                    "challenge": challenge,
                    "allowCredentials": [],
                    "userVerification": "preferred",
                },
                "mediation": "conditional",
            }),
            state: json!({ "challenge": challenge }),
        })
    }

    async fn finish_discoverable_login<C: CredentialResolver>(
        &self,
        state: &Value,
        response: &Value,
        resolver: &C,
    ) -> Result<VerifiedAssertion> {
        let state: LoginState =
            serde_json::from_value(state.clone()).map_err(|_| AuthError::SessionExpired)?;
        let response: ClientResponse<AssertionBody> =
            serde_json::from_value(response.clone()).map_err(|_| AuthError::LoginFailed)?;
        let credential_id = URL_SAFE_NO_PAD
            .decode(&response.id)
            .map_err(|_| AuthError::LoginFailed)?;

        let body = &response.response;
        let resolved = resolver.resolve(&credential_id, body.user_handle).await?;
        let stored = &resolved.credential;

        if body.challenge != state.challenge
            || body.signature != sign(&body.challenge, &stored.public_key)
        {
            tracing::warn!(user_handle = %body.user_handle, "Mock assertion rejected");
            return Err(AuthError::LoginFailed);
        }
        check_sign_count(stored.sign_count, body.sign_count)?;

        let usage = CredentialUsage {
            credential_id,
            sign_count: body.sign_count,
            backup_state: stored.backup_state,
            engine_state: engine_state(&stored.public_key, body.sign_count),
        };

        Ok(VerifiedAssertion { resolved, usage })
    }
}

/// Signature the mock engine expects for `challenge` under `public_key`.
#[must_use]
pub fn sign(challenge: &str, public_key: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(challenge.as_bytes());
    hasher.update(public_key);
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Software authenticator holding one discoverable credential.
#[derive(Debug, Clone)]
pub struct MockAuthenticator {
    /// Credential ID.
    pub credential_id: Vec<u8>,
    /// Public key.
    pub public_key: Vec<u8>,
    /// User handle assigned at registration.
    pub user_handle: Option<Uuid>,
    /// Signature counter; incremented on every assertion unless zero-counting.
    pub counter: u32,
    /// Authenticator never increments its counter.
    pub zero_counter: bool,
}

impl MockAuthenticator {
    /// Fresh authenticator with a random credential.
    #[must_use]
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let mut credential_id = vec![0u8; 16];
        let mut public_key = vec![0u8; 32];
        rng.fill_bytes(&mut credential_id);
        rng.fill_bytes(&mut public_key);

        Self {
            credential_id,
            public_key,
            user_handle: None,
            counter: 0,
            zero_counter: false,
        }
    }

    /// Authenticator that reports a counter of zero forever.
    #[must_use]
    pub fn without_counter() -> Self {
        Self {
            zero_counter: true,
            ..Self::new()
        }
    }

    /// Credential ID as sent on the wire.
    #[must_use]
    pub fn id(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.credential_id)
    }

    /// Answer a registration ceremony.
    ///
    /// Takes the user handle from `options.publicKey.user.id`.
    pub fn register(&mut self, options: &Value) -> Value {
        let challenge = options
            .pointer("/publicKey/challenge")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let handle = options
            .pointer("/publicKey/user/id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::nil);
        self.user_handle = Some(handle);

        json!({
            "id": self.id(),
            "type": "public-key",
            "response": {
                "challenge": challenge,
                "publicKey": URL_SAFE_NO_PAD.encode(&self.public_key),
                "userHandle": handle,
                "transports": ["internal", "hybrid"],
                "signCount": self.counter,
            }
        })
    }

    /// Answer a login ceremony, advancing the counter.
    pub fn assert(&mut self, options: &Value) -> Value {
        if !self.zero_counter {
            self.counter += 1;
        }
        self.assert_with_counter(options, self.counter)
    }

    /// Answer a login ceremony reporting `counter` without touching state.
    #[must_use]
    pub fn assert_with_counter(&self, options: &Value, counter: u32) -> Value {
        let challenge = options
            .pointer("/publicKey/challenge")
            .and_then(Value::as_str)
            .unwrap_or_default();

        json!({
            "id": self.id(),
            "type": "public-key",
            "response": {
                "challenge": challenge,
                "userHandle": self.user_handle.unwrap_or_else(Uuid::nil),
                "signature": sign(challenge, &self.public_key),
                "signCount": counter,
            }
        })
    }
}

impl Default for MockAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}
