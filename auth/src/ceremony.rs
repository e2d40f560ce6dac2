//! Ceremony orchestrator.
//!
//! Drives the begin and finish steps of passkey registration and discoverable
//! login. Cryptographic verification belongs to the [`WebAuthnProvider`]; this
//! module owns the surrounding bookkeeping:
//!
//! ```text
//! email model:       begin_registration ──► verify_code ──► finish_registration
//!                      (code stored, sent)   (challenge)     (credential + session)
//!
//! credential model:  begin_credential_registration ──► finish_registration
//!
//! both models:       begin_login ──► finish_login
//! ```
//!
//! Every challenge is single use. Finish steps take the stored session out of
//! the store before verification starts, so a replay or a concurrent second
//! finish sees [`AuthError::SessionExpired`] even if the first attempt failed.

use crate::config::IdentityModel;
use crate::credential::{check_sign_count, CredentialOwner, StoredCredential};
use crate::environment::AuthEnvironment;
use crate::error::{AuthError, Result};
use crate::principal::{CredentialAccount, Principal};
use crate::providers::webauthn::{CredentialResolver, ResolvedCredential};
use crate::providers::{CodeSender, EphemeralStore, IdentityRepository, WebAuthnProvider};
use crate::session::IssuedSession;
use crate::stores::{CeremonyPurpose, ChallengeSession, RegistrationSession};
use crate::utils::{generate_secret, generate_verification_code, is_valid_email, normalize_email};
use constant_time_eq::constant_time_eq;
use serde_json::Value;
use uuid::Uuid;

/// Longest accepted display name, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 64;

/// Output of a begin step that hands options to the browser.
#[derive(Debug, Clone, PartialEq)]
pub struct CeremonyStart {
    /// Ceremony session ID, carried in the `webauthn_session` cookie.
    pub session_id: String,
    /// Options for `navigator.credentials.create()` / `.get()`.
    pub options: Value,
}

/// Registration and login ceremonies over one environment.
pub struct CeremonyOrchestrator<'a, S, R, W, M>
where
    S: EphemeralStore,
    R: IdentityRepository,
    W: WebAuthnProvider,
    M: CodeSender,
{
    env: &'a AuthEnvironment<S, R, W, M>,
}

impl<'a, S, R, W, M> CeremonyOrchestrator<'a, S, R, W, M>
where
    S: EphemeralStore,
    R: IdentityRepository,
    W: WebAuthnProvider,
    M: CodeSender,
{
    /// Create an orchestrator.
    #[must_use]
    pub const fn new(env: &'a AuthEnvironment<S, R, W, M>) -> Self {
        Self { env }
    }

    const fn model(&self) -> IdentityModel {
        self.env.config.identity_model
    }

    fn require_model(&self, model: IdentityModel) -> Result<()> {
        if self.model() == model {
            Ok(())
        } else {
            Err(AuthError::UnsupportedOperation)
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Registration
    // ═══════════════════════════════════════════════════════════════════════

    /// Start email-verified registration by sending a verification code.
    ///
    /// Calling again before the code is used replaces the pending code.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidRequest`]: malformed email
    /// - [`AuthError::AlreadyRegistered`]: the email already has a credential
    /// - [`AuthError::UnsupportedOperation`]: credential-as-identity deployment
    pub async fn begin_registration(&self, email: &str) -> Result<()> {
        self.require_model(IdentityModel::EmailVerified)?;
        let email = checked_email(email)?;

        if let Some(user) = self.env.repository.find_user_by_email(&email).await? {
            let credentials = self.env.repository.list_credentials_for_user(user.id).await?;
            if !credentials.is_empty() {
                tracing::info!(email = %email, "Registration refused: email already registered");
                return Err(AuthError::AlreadyRegistered);
            }
        }

        let code = generate_verification_code();
        let ttl = self.env.config.verification.code_ttl;
        self.env.state.save_code(&email, &code, ttl).await?;
        self.env
            .codes
            .send_verification_code(&email, &code, ttl)
            .await?;

        tracing::info!(email = %email, "Verification code issued");
        Ok(())
    }

    /// Check a verification code and begin the registration ceremony.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NoPendingVerification`]: no live code for this email
    /// - [`AuthError::CodeMismatch`]: wrong code (the pending code survives)
    /// - [`AuthError::UnsupportedOperation`]: credential-as-identity deployment
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<CeremonyStart> {
        self.require_model(IdentityModel::EmailVerified)?;
        let email = checked_email(email)?;

        // Taken, not read: only one concurrent verification can hold the code.
        let pending = self
            .env
            .state
            .take_code(&email)
            .await?
            .ok_or(AuthError::NoPendingVerification)?;

        if !constant_time_eq(pending.code.as_bytes(), code.as_bytes()) {
            tracing::warn!(email = %email, "Verification code mismatch");
            self.env
                .state
                .restore_code(&email, &pending, self.env.config.verification.code_ttl)
                .await?;
            return Err(AuthError::CodeMismatch);
        }

        let account = match self.env.repository.find_user_by_email(&email).await? {
            Some(account) => account,
            None => match self.env.repository.create_user(&email, Uuid::new_v4()).await {
                Ok(account) => account,
                // Lost a creation race with a parallel verification.
                Err(AuthError::AlreadyRegistered) => self
                    .env
                    .repository
                    .find_user_by_email(&email)
                    .await?
                    .ok_or_else(|| {
                        AuthError::DatabaseError("user vanished after conflict".into())
                    })?,
                Err(e) => return Err(e),
            },
        };

        let credentials = self
            .env
            .repository
            .list_credentials_for_user(account.id)
            .await?;
        let user_id = account.id;
        let principal = Principal::User {
            account,
            credentials,
        };

        let challenge = self.env.webauthn.begin_registration(&principal).await?;
        let session_id = generate_secret();
        self.env
            .state
            .save_ceremony(
                &session_id,
                &ChallengeSession {
                    purpose: CeremonyPurpose::Registration { user_id },
                    state: challenge.state,
                },
                self.env.config.passkey.challenge_ttl,
            )
            .await?;

        tracing::info!(email = %email, %user_id, "Registration ceremony started");
        Ok(CeremonyStart {
            session_id,
            options: challenge.options,
        })
    }

    /// Begin a credential-as-identity registration.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidRequest`]: empty or overlong display name
    /// - [`AuthError::UnsupportedOperation`]: email-verified deployment
    pub async fn begin_credential_registration(&self, display_name: &str) -> Result<CeremonyStart> {
        self.require_model(IdentityModel::CredentialIsIdentity)?;

        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(AuthError::InvalidRequest("display_name is required".into()));
        }
        if display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(AuthError::InvalidRequest(format!(
                "display_name must be at most {MAX_DISPLAY_NAME_LEN} characters"
            )));
        }

        let principal = Principal::Credential {
            account: CredentialAccount {
                handle: Uuid::new_v4(),
                display_name: display_name.to_string(),
            },
            credential: None,
        };

        let challenge = self.env.webauthn.begin_registration(&principal).await?;
        let session_id = generate_secret();
        self.env
            .state
            .save_registration(
                &session_id,
                &RegistrationSession {
                    handle: principal.handle(),
                    display_name: display_name.to_string(),
                    state: challenge.state,
                },
                self.env.config.passkey.challenge_ttl,
            )
            .await?;

        tracing::info!(handle = %principal.handle(), "Registration ceremony started");
        Ok(CeremonyStart {
            session_id,
            options: challenge.options,
        })
    }

    /// Verify the attestation, store the credential and issue a session.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingSession`]: no ceremony cookie
    /// - [`AuthError::SessionExpired`]: ceremony expired or already finished
    /// - [`AuthError::RegistrationFailed`]: the engine rejected the response
    /// - [`AuthError::CredentialAlreadyRegistered`]: duplicate credential ID
    pub async fn finish_registration(
        &self,
        session_id: Option<&str>,
        response: &Value,
    ) -> Result<IssuedSession> {
        let session_id = session_id
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::MissingSession)?;

        let (principal, state) = match self.model() {
            IdentityModel::EmailVerified => self.take_user_registration(session_id).await?,
            IdentityModel::CredentialIsIdentity => {
                let session = self
                    .env
                    .state
                    .take_registration(session_id)
                    .await?
                    .ok_or(AuthError::SessionExpired)?;
                let principal = Principal::Credential {
                    account: CredentialAccount {
                        handle: session.handle,
                        display_name: session.display_name,
                    },
                    credential: None,
                };
                (principal, session.state)
            }
        };

        let registered = self
            .env
            .webauthn
            .finish_registration(&principal, &state, response)
            .await?;
        let credential = StoredCredential::new(principal.owner(), registered);
        self.env.repository.create_credential(&credential).await?;

        tracing::info!(
            handle = %principal.handle(),
            aaguid = %credential.aaguid,
            "Passkey registered"
        );

        let principal = match principal {
            Principal::Credential { account, .. } => Principal::Credential {
                account,
                credential: Some(credential),
            },
            Principal::User {
                account,
                mut credentials,
            } => {
                credentials.push(credential);
                Principal::User {
                    account,
                    credentials,
                }
            }
        };

        self.env.sessions().issue(&principal).await
    }

    async fn take_user_registration(&self, session_id: &str) -> Result<(Principal, Value)> {
        let session = self
            .env
            .state
            .take_ceremony(session_id)
            .await?
            .ok_or(AuthError::SessionExpired)?;

        let CeremonyPurpose::Registration { user_id } = session.purpose else {
            tracing::warn!("Login ceremony presented to registration finish");
            return Err(AuthError::SessionExpired);
        };

        let account = self
            .env
            .repository
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::SessionExpired)?;
        let credentials = self
            .env
            .repository
            .list_credentials_for_user(user_id)
            .await?;

        Ok((
            Principal::User {
                account,
                credentials,
            },
            session.state,
        ))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Login
    // ═══════════════════════════════════════════════════════════════════════

    /// Begin a discoverable login.
    ///
    /// # Errors
    ///
    /// Returns an infrastructure error if the engine or store fails.
    pub async fn begin_login(&self) -> Result<CeremonyStart> {
        let challenge = self.env.webauthn.begin_discoverable_login().await?;
        let session_id = generate_secret();
        self.env
            .state
            .save_ceremony(
                &session_id,
                &ChallengeSession {
                    purpose: CeremonyPurpose::Login,
                    state: challenge.state,
                },
                self.env.config.passkey.challenge_ttl,
            )
            .await?;

        Ok(CeremonyStart {
            session_id,
            options: challenge.options,
        })
    }

    /// Verify the assertion, record counter and backup state, issue a session.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingSession`]: no ceremony cookie
    /// - [`AuthError::SessionExpired`]: ceremony expired or already finished
    /// - [`AuthError::LoginFailed`]: unknown credential, bad signature or
    ///   signature counter regression
    pub async fn finish_login(
        &self,
        session_id: Option<&str>,
        response: &Value,
    ) -> Result<IssuedSession> {
        let session_id = session_id
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::MissingSession)?;

        let session = self
            .env
            .state
            .take_ceremony(session_id)
            .await?
            .ok_or(AuthError::SessionExpired)?;
        if session.purpose != CeremonyPurpose::Login {
            tracing::warn!("Registration ceremony presented to login finish");
            return Err(AuthError::SessionExpired);
        }

        let resolver = RepositoryResolver::new(&self.env.repository, self.model());
        let verified = self
            .env
            .webauthn
            .finish_discoverable_login(&session.state, response, &resolver)
            .await?;

        check_sign_count(
            verified.resolved.credential.sign_count,
            verified.usage.sign_count,
        )?;
        if !self
            .env
            .repository
            .record_credential_usage(&verified.usage)
            .await?
        {
            tracing::warn!(
                received = verified.usage.sign_count,
                "Signature counter already advanced by a concurrent login"
            );
            return Err(AuthError::LoginFailed);
        }

        let principal = verified.resolved.principal;
        tracing::info!(handle = %principal.handle(), "Passkey login");
        self.env.sessions().issue(&principal).await
    }
}

fn checked_email(email: &str) -> Result<String> {
    let email = normalize_email(email);
    if is_valid_email(&email) {
        Ok(email)
    } else {
        Err(AuthError::InvalidRequest("invalid email".into()))
    }
}

/// Resolves discoverable-login credentials against the repository.
///
/// Only credentials owned according to the configured identity model resolve.
pub struct RepositoryResolver<'a, R> {
    repository: &'a R,
    model: IdentityModel,
}

impl<'a, R: IdentityRepository> RepositoryResolver<'a, R> {
    /// Create a resolver.
    #[must_use]
    pub const fn new(repository: &'a R, model: IdentityModel) -> Self {
        Self { repository, model }
    }
}

impl<R: IdentityRepository> CredentialResolver for RepositoryResolver<'_, R> {
    async fn resolve(&self, credential_id: &[u8], user_handle: Uuid) -> Result<ResolvedCredential> {
        let Some(credential) = self.repository.find_credential(credential_id).await? else {
            tracing::warn!(%user_handle, "Login with unknown credential");
            return Err(AuthError::LoginFailed);
        };

        let principal = match (&credential.owner, self.model) {
            (CredentialOwner::User { user_id }, IdentityModel::EmailVerified) => {
                let account = self
                    .repository
                    .find_user_by_handle(user_handle)
                    .await?
                    .filter(|account| account.id == *user_id)
                    .ok_or_else(|| {
                        tracing::warn!(%user_handle, "Credential does not belong to user handle");
                        AuthError::LoginFailed
                    })?;
                let credentials = self.repository.list_credentials_for_user(account.id).await?;
                Principal::User {
                    account,
                    credentials,
                }
            }
            (
                CredentialOwner::Account {
                    handle,
                    display_name,
                },
                IdentityModel::CredentialIsIdentity,
            ) if *handle == user_handle => Principal::Credential {
                account: CredentialAccount {
                    handle: *handle,
                    display_name: display_name.clone(),
                },
                credential: Some(credential.clone()),
            },
            _ => {
                tracing::warn!(%user_handle, "Credential owner does not match identity model");
                return Err(AuthError::LoginFailed);
            }
        };

        Ok(ResolvedCredential {
            principal,
            credential,
        })
    }
}
