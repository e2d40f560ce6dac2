//! `WebAuthn` provider backed by the `webauthn-rs` crate.
//!
//! Ceremony state (`PasskeyRegistration`, `DiscoverableAuthentication`) and
//! stored credentials (`Passkey`) are carried as JSON. Flags, counter and
//! attestation GUID are read from the serialized `Passkey` so the repository
//! can keep them in plain columns.

use crate::config::PasskeyConfig;
use crate::credential::{CredentialUsage, RegisteredCredential};
use crate::error::{AuthError, Result};
use crate::principal::Principal;
use crate::providers::webauthn::{
    CeremonyChallenge, CredentialResolver, VerifiedAssertion, WebAuthnProvider,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;
use webauthn_rs::prelude::{
    DiscoverableAuthentication, DiscoverableKey, Passkey, PasskeyRegistration, PublicKeyCredential,
    RegisterPublicKeyCredential, Url, Webauthn, WebauthnBuilder,
};

/// Production `WebAuthn` provider.
#[derive(Clone)]
pub struct WebauthnRsProvider {
    webauthn: Arc<Webauthn>,
}

impl WebauthnRsProvider {
    /// Build a provider for one relying party.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EngineError`] if the origin is not a valid URL or
    /// does not match the RP ID.
    pub fn new(config: &PasskeyConfig) -> Result<Self> {
        let origin = Url::parse(&config.origin)
            .map_err(|e| AuthError::EngineError(format!("Invalid RP origin: {e}")))?;

        let webauthn = WebauthnBuilder::new(&config.rp_id, &origin)
            .map_err(|e| AuthError::EngineError(format!("Invalid WebAuthn configuration: {e}")))?
            .rp_name(&config.rp_name)
            .build()
            .map_err(|e| AuthError::EngineError(format!("Failed to build WebAuthn: {e}")))?;

        Ok(Self {
            webauthn: Arc::new(webauthn),
        })
    }
}

impl WebAuthnProvider for WebauthnRsProvider {
    async fn begin_registration(&self, principal: &Principal) -> Result<CeremonyChallenge> {
        let exclude: Vec<_> = principal
            .credentials()
            .iter()
            .map(|c| c.credential_id.clone().into())
            .collect();
        let exclude = if exclude.is_empty() { None } else { Some(exclude) };

        let (ccr, registration) = self
            .webauthn
            .start_passkey_registration(
                principal.handle(),
                principal.name(),
                principal.display_name(),
                exclude,
            )
            .map_err(|e| AuthError::EngineError(format!("Failed to start registration: {e}")))?;

        let mut options = serde_json::to_value(&ccr)?;
        require_resident_key(&mut options);

        Ok(CeremonyChallenge {
            options,
            state: serde_json::to_value(&registration)?,
        })
    }

    async fn finish_registration(
        &self,
        principal: &Principal,
        state: &Value,
        response: &Value,
    ) -> Result<RegisteredCredential> {
        let registration: PasskeyRegistration =
            serde_json::from_value(state.clone()).map_err(|_| AuthError::SessionExpired)?;
        let credential: RegisterPublicKeyCredential = serde_json::from_value(response.clone())
            .map_err(|e| {
                tracing::warn!(error = %e, "Malformed registration response");
                AuthError::RegistrationFailed
            })?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(&credential, &registration)
            .map_err(|e| {
                tracing::warn!(
                    error = %e,
                    handle = %principal.handle(),
                    "Registration verification failed"
                );
                AuthError::RegistrationFailed
            })?;

        let engine_state = serde_json::to_value(&passkey)?;
        let summary = PasskeySummary::read(&engine_state);
        let transports = response
            .pointer("/response/transports")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or(summary.transports);

        Ok(RegisteredCredential {
            credential_id: passkey.cred_id().as_slice().to_vec(),
            public_key: summary.public_key,
            transports,
            sign_count: summary.sign_count,
            backup_eligible: summary.backup_eligible,
            backup_state: summary.backup_state,
            aaguid: summary.aaguid,
            engine_state,
        })
    }

    async fn begin_discoverable_login(&self) -> Result<CeremonyChallenge> {
        let (rcr, authentication) = self
            .webauthn
            .start_discoverable_authentication()
            .map_err(|e| AuthError::EngineError(format!("Failed to start login: {e}")))?;

        Ok(CeremonyChallenge {
            options: serde_json::to_value(&rcr)?,
            state: serde_json::to_value(&authentication)?,
        })
    }

    async fn finish_discoverable_login<C: CredentialResolver>(
        &self,
        state: &Value,
        response: &Value,
        resolver: &C,
    ) -> Result<VerifiedAssertion> {
        let authentication: DiscoverableAuthentication =
            serde_json::from_value(state.clone()).map_err(|_| AuthError::SessionExpired)?;
        let credential: PublicKeyCredential =
            serde_json::from_value(response.clone()).map_err(|e| {
                tracing::warn!(error = %e, "Malformed login response");
                AuthError::LoginFailed
            })?;

        let (user_handle, credential_id) = self
            .webauthn
            .identify_discoverable_authentication(&credential)
            .map_err(|e| {
                tracing::warn!(error = %e, "Assertion carries no usable user handle");
                AuthError::LoginFailed
            })?;

        let resolved = resolver.resolve(credential_id, user_handle).await?;

        let mut passkey: Passkey =
            serde_json::from_value(resolved.credential.engine_state.clone())?;
        let keys = [DiscoverableKey::from(&passkey)];

        let result = self
            .webauthn
            .finish_discoverable_authentication(&credential, authentication, &keys)
            .map_err(|e| {
                tracing::warn!(error = %e, %user_handle, "Assertion verification failed");
                AuthError::LoginFailed
            })?;

        passkey.update_credential(&result);

        let usage = CredentialUsage {
            credential_id: result.cred_id().as_slice().to_vec(),
            sign_count: result.counter(),
            backup_state: result.backup_state(),
            engine_state: serde_json::to_value(&passkey)?,
        };

        Ok(VerifiedAssertion { resolved, usage })
    }
}

/// Ask the browser for a discoverable (resident) credential.
fn require_resident_key(options: &mut Value) {
    if let Some(public_key) = options.get_mut("publicKey").and_then(Value::as_object_mut) {
        let selection = public_key
            .entry("authenticatorSelection")
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Some(selection) = selection.as_object_mut() {
            selection.insert("residentKey".into(), Value::String("required".into()));
            selection.insert("requireResidentKey".into(), Value::Bool(true));
        }
    }
}

/// Column values extracted from a serialized `Passkey`.
#[derive(Debug, Default)]
struct PasskeySummary {
    public_key: Vec<u8>,
    transports: Vec<String>,
    sign_count: u32,
    backup_eligible: bool,
    backup_state: bool,
    aaguid: Uuid,
}

impl PasskeySummary {
    fn read(passkey: &Value) -> Self {
        let cred = &passkey["cred"];
        let flag = |name: &str| cred.get(name).and_then(Value::as_bool).unwrap_or(false);

        Self {
            public_key: cred
                .get("cred")
                .and_then(|key| serde_json::to_vec(key).ok())
                .unwrap_or_default(),
            transports: cred
                .get("transports")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            sign_count: cred
                .get("counter")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0),
            backup_eligible: flag("backup_eligible"),
            backup_state: flag("backup_state"),
            aaguid: cred.get("attestation").and_then(find_aaguid).unwrap_or_else(Uuid::nil),
        }
    }
}

/// Depth-first search for an `aaguid` field in attestation metadata.
fn find_aaguid(value: &Value) -> Option<Uuid> {
    match value {
        Value::Object(map) => map
            .get("aaguid")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .or_else(|| map.values().find_map(find_aaguid)),
        Value::Array(items) => items.iter().find_map(find_aaguid),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resident_key_is_required() {
        let mut options = json!({
            "publicKey": {
                "challenge": "abc",
                "authenticatorSelection": { "residentKey": "discouraged", "requireResidentKey": false }
            }
        });
        require_resident_key(&mut options);
        assert_eq!(options["publicKey"]["authenticatorSelection"]["residentKey"], "required");
        assert_eq!(options["publicKey"]["authenticatorSelection"]["requireResidentKey"], true);
    }

    #[test]
    fn test_resident_key_selection_created_when_absent() {
        let mut options = json!({ "publicKey": { "challenge": "abc" } });
        require_resident_key(&mut options);
        assert_eq!(options["publicKey"]["authenticatorSelection"]["residentKey"], "required");
    }

    #[test]
    fn test_summary_reads_flags_and_aaguid() {
        let passkey = json!({
            "cred": {
                "cred_id": "AAEC",
                "cred": { "type_": "ES256", "key": { "EC_EC2": { "curve": "SECP256R1", "x": "AA", "y": "AA" } } },
                "counter": 7,
                "transports": ["internal", "hybrid"],
                "backup_eligible": true,
                "backup_state": false,
                "attestation": {
                    "data": "None",
                    "metadata": { "Packed": { "aaguid": "ea9b8d66-4d01-1d21-3ce4-b6b48cb575d4" } }
                }
            }
        });

        let summary = PasskeySummary::read(&passkey);
        assert_eq!(summary.sign_count, 7);
        assert!(summary.backup_eligible);
        assert!(!summary.backup_state);
        assert_eq!(summary.transports, vec!["internal", "hybrid"]);
        assert_eq!(
            summary.aaguid.to_string(),
            "ea9b8d66-4d01-1d21-3ce4-b6b48cb575d4"
        );
        assert!(!summary.public_key.is_empty());
    }

    #[test]
    fn test_summary_defaults_for_unattested() {
        let summary = PasskeySummary::read(&json!({ "cred": { "attestation": { "data": "None", "metadata": "None" } } }));
        assert_eq!(summary.aaguid, Uuid::nil());
        assert_eq!(summary.sign_count, 0);
        assert!(summary.transports.is_empty());
    }

    #[test]
    fn test_provider_rejects_bad_origin() {
        let config = PasskeyConfig::new("not a url".into(), "example.com".into());
        assert!(matches!(
            WebauthnRsProvider::new(&config),
            Err(AuthError::EngineError(_))
        ));
    }

    #[tokio::test]
    async fn test_discoverable_login_options_have_no_allow_list() {
        let config = PasskeyConfig::new("https://auth.example.com".into(), "example.com".into());
        let Ok(provider) = WebauthnRsProvider::new(&config) else {
            return;
        };
        let Ok(challenge) = provider.begin_discoverable_login().await else {
            return;
        };
        let allow = challenge
            .options
            .pointer("/publicKey/allowCredentials")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        assert_eq!(allow, 0);
        assert!(challenge.options.pointer("/publicKey/challenge").is_some());
    }
}
