//! Authentication configuration.
//!
//! Components receive these structures through their constructors. Nothing in
//! this crate reads the process environment; the server binary does that once
//! at startup and builds an [`AuthConfig`].

use chrono::Duration;

/// Which identity model governs registration and login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityModel {
    /// Email-verified users owning zero or more credentials.
    #[default]
    EmailVerified,
    /// Each credential is its own account with a display name.
    CredentialIsIdentity,
}

impl IdentityModel {
    /// Parse the `IDENTITY_MODEL` spelling (`email` or `credential`).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "email" | "email_verified" | "user" => Some(Self::EmailVerified),
            "credential" | "credential_is_identity" | "passkey" => {
                Some(Self::CredentialIsIdentity)
            }
            _ => None,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmailVerified => "email",
            Self::CredentialIsIdentity => "credential",
        }
    }
}

/// Passkey (`WebAuthn`) configuration.
#[derive(Debug, Clone)]
pub struct PasskeyConfig {
    /// Expected origin (e.g., "https://auth.example.com").
    pub origin: String,

    /// Relying Party ID (e.g., "example.com").
    pub rp_id: String,

    /// Relying Party display name shown by authenticators.
    ///
    /// Default: "Auth"
    pub rp_name: String,

    /// Lifetime of challenge and registration sessions.
    ///
    /// Default: 5 minutes
    pub challenge_ttl: Duration,
}

impl PasskeyConfig {
    /// Create new Passkey configuration.
    ///
    /// # Arguments
    ///
    /// * `origin` - Expected origin (e.g., "https://auth.example.com")
    /// * `rp_id` - Relying Party ID (e.g., "example.com")
    #[must_use]
    pub fn new(origin: String, rp_id: String) -> Self {
        Self {
            origin,
            rp_id,
            rp_name: "Auth".to_string(),
            challenge_ttl: Duration::minutes(5),
        }
    }

    /// Set the relying party display name.
    #[must_use]
    pub fn with_rp_name(mut self, name: impl Into<String>) -> Self {
        self.rp_name = name.into();
        self
    }

    /// Set challenge time-to-live.
    #[must_use]
    pub const fn with_challenge_ttl(mut self, ttl: Duration) -> Self {
        self.challenge_ttl = ttl;
        self
    }

    /// Whether the origin is served over TLS.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.origin.starts_with("https://")
    }
}

impl Default for PasskeyConfig {
    fn default() -> Self {
        Self::new("http://localhost:8081".to_string(), "localhost".to_string())
    }
}

/// Email verification configuration.
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    /// Code time-to-live.
    ///
    /// Default: 10 minutes
    pub code_ttl: Duration,

    /// Log codes instead of treating them as undelivered.
    ///
    /// Default: `false`
    pub log_codes: bool,
}

impl VerificationConfig {
    /// Create verification configuration with defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            code_ttl: Duration::minutes(10),
            log_codes: false,
        }
    }

    /// Set code time-to-live.
    #[must_use]
    pub const fn with_code_ttl(mut self, ttl: Duration) -> Self {
        self.code_ttl = ttl;
        self
    }

    /// Enable or disable code logging.
    #[must_use]
    pub const fn with_log_codes(mut self, enabled: bool) -> Self {
        self.log_codes = enabled;
        self
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Authenticated session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sliding window; every successful validation resets the TTL to this.
    ///
    /// Default: 24 hours
    pub ttl: Duration,
}

impl SessionConfig {
    /// Shortest accepted session window.
    pub const MIN_TTL: Duration = Duration::minutes(15);

    /// Longest accepted session window.
    pub const MAX_TTL: Duration = Duration::hours(24);

    /// Create session configuration with defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ttl: Duration::hours(24),
        }
    }

    /// Set the sliding window, clamped to 15 minutes ..= 24 hours.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl.clamp(Self::MIN_TTL, Self::MAX_TTL);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Cookie and unauthenticated-request policy.
#[derive(Debug, Clone, Default)]
pub struct CookieConfig {
    /// Set the `Secure` attribute on every cookie.
    pub secure: bool,

    /// Login page that browser navigations are redirected to when unauthenticated.
    pub login_url: Option<String>,
}

impl CookieConfig {
    /// Create cookie configuration.
    #[must_use]
    pub const fn new(secure: bool) -> Self {
        Self {
            secure,
            login_url: None,
        }
    }

    /// Set the login redirect target.
    #[must_use]
    pub fn with_login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = Some(url.into());
        self
    }
}

/// Complete configuration for the auth components.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Identity model.
    pub identity_model: IdentityModel,
    /// Passkey settings.
    pub passkey: PasskeyConfig,
    /// Email verification settings.
    pub verification: VerificationConfig,
    /// Session settings.
    pub session: SessionConfig,
    /// Cookie settings.
    pub cookies: CookieConfig,
}

impl AuthConfig {
    /// Build configuration for a relying party, deriving the cookie `Secure`
    /// flag from the origin scheme.
    #[must_use]
    pub fn new(passkey: PasskeyConfig) -> Self {
        let cookies = CookieConfig::new(passkey.is_https());
        Self {
            identity_model: IdentityModel::default(),
            passkey,
            verification: VerificationConfig::default(),
            session: SessionConfig::default(),
            cookies,
        }
    }

    /// Set the identity model.
    #[must_use]
    pub const fn with_identity_model(mut self, model: IdentityModel) -> Self {
        self.identity_model = model;
        self
    }

    /// Set verification settings.
    #[must_use]
    pub const fn with_verification(mut self, verification: VerificationConfig) -> Self {
        self.verification = verification;
        self
    }

    /// Set session settings.
    #[must_use]
    pub const fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set the login redirect target.
    #[must_use]
    pub fn with_login_url(mut self, url: impl Into<String>) -> Self {
        self.cookies = self.cookies.with_login_url(url);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passkey_config_builder() {
        let config = PasskeyConfig::new("https://auth.example.com".to_string(), "example.com".to_string())
            .with_rp_name("Home")
            .with_challenge_ttl(Duration::minutes(2));

        assert_eq!(config.rp_id, "example.com");
        assert_eq!(config.rp_name, "Home");
        assert_eq!(config.challenge_ttl, Duration::minutes(2));
        assert!(config.is_https());
    }

    #[test]
    fn test_secure_cookie_follows_origin_scheme() {
        let https = AuthConfig::new(PasskeyConfig::new("https://a.example".into(), "a.example".into()));
        let http = AuthConfig::new(PasskeyConfig::new("http://localhost:8081".into(), "localhost".into()));

        assert!(https.cookies.secure);
        assert!(!http.cookies.secure);
    }

    #[test]
    fn test_session_ttl_is_clamped() {
        assert_eq!(SessionConfig::new().with_ttl(Duration::minutes(1)).ttl, Duration::minutes(15));
        assert_eq!(SessionConfig::new().with_ttl(Duration::days(7)).ttl, Duration::hours(24));
        assert_eq!(SessionConfig::new().with_ttl(Duration::hours(2)).ttl, Duration::hours(2));
    }

    #[test]
    fn test_identity_model_parse() {
        assert_eq!(IdentityModel::parse("email"), Some(IdentityModel::EmailVerified));
        assert_eq!(IdentityModel::parse(" Credential "), Some(IdentityModel::CredentialIsIdentity));
        assert_eq!(IdentityModel::parse("ldap"), None);
    }
}
