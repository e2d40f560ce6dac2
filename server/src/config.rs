//! Configuration management for the passkey gate server.
//!
//! Loads configuration from environment variables. Required variables that
//! are missing or unparsable are startup errors.

use anyhow::{anyhow, bail, Context, Result};
use passkey_gate_auth::{
    AuthConfig, IdentityModel, PasskeyConfig, SessionConfig, VerificationConfig,
};
use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (`host:port`).
    pub addr: String,
    /// `PostgreSQL` configuration.
    pub postgres: PostgresConfig,
    /// Redis connection URL.
    pub redis_url: String,
    /// Relying party ID.
    pub rp_id: String,
    /// Relying party origin, also the allowed CORS origin.
    pub rp_origin: String,
    /// Relying party display name.
    pub rp_name: String,
    /// Login page for unauthenticated browser requests.
    pub login_url: Option<String>,
    /// Log verification codes.
    pub log_verification_codes: bool,
    /// Identity model.
    pub identity_model: IdentityModel,
    /// Sliding session window in seconds.
    pub session_ttl_seconds: i64,
    /// SMTP delivery, when configured.
    pub smtp: Option<SmtpConfig>,
}

/// `PostgreSQL` configuration.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Apply embedded migrations at boot.
    pub run_migrations: bool,
}

/// SMTP configuration.
#[derive(Clone)]
pub struct SmtpConfig {
    /// SMTP host.
    pub host: String,
    /// SMTP port.
    pub port: u16,
    /// Username and password.
    pub credentials: Option<(String, String)>,
    /// Sender mailbox.
    pub from: String,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("authenticated", &self.credentials.is_some())
            .field("from", &self.from)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns error if a required variable is missing or a value is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns error if a required variable is missing or a value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| anyhow!("{key} is required"));
        let parse_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let addr = parse_or("ADDR", "0.0.0.0:8081");
        let addr = if addr.starts_with(':') {
            format!("0.0.0.0{addr}")
        } else {
            addr
        };

        let redis_url = match (get("REDIS_URL"), get("REDIS_ADDR")) {
            (Some(url), _) => url,
            (None, Some(addr)) => format!("redis://{addr}"),
            (None, None) => bail!("REDIS_URL or REDIS_ADDR is required"),
        };

        let identity_model = parse_or("IDENTITY_MODEL", "email");
        let identity_model = IdentityModel::parse(&identity_model)
            .ok_or_else(|| anyhow!("IDENTITY_MODEL must be `email` or `credential`, got `{identity_model}`"))?;

        let smtp = match get("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                port: parse_or("SMTP_PORT", "587")
                    .parse()
                    .context("SMTP_PORT must be a port number")?,
                credentials: get("SMTP_USERNAME").zip(get("SMTP_PASSWORD")),
                from: require("SMTP_FROM")?,
                host,
            }),
            None => None,
        };

        Ok(Self {
            addr,
            postgres: PostgresConfig {
                url: require("DATABASE_URL")?,
                max_connections: parse_or("DATABASE_MAX_CONNECTIONS", "10")
                    .parse()
                    .context("DATABASE_MAX_CONNECTIONS must be a number")?,
                run_migrations: parse_bool(&parse_or("RUN_MIGRATIONS", "true"))
                    .context("RUN_MIGRATIONS must be a boolean")?,
            },
            redis_url,
            rp_id: require("RP_ID")?,
            rp_origin: require("RP_ORIGIN")?,
            rp_name: parse_or("RP_NAME", "Auth"),
            login_url: get("LOGIN_URL"),
            log_verification_codes: parse_bool(&parse_or("LOG_VERIFICATION_CODES", "false"))
                .context("LOG_VERIFICATION_CODES must be a boolean")?,
            identity_model,
            session_ttl_seconds: parse_or("SESSION_TTL_SECONDS", "86400")
                .parse()
                .context("SESSION_TTL_SECONDS must be a number")?,
            smtp,
        })
    }

    /// Library configuration for the auth components.
    #[must_use]
    pub fn auth_config(&self) -> AuthConfig {
        let passkey = PasskeyConfig::new(self.rp_origin.clone(), self.rp_id.clone())
            .with_rp_name(self.rp_name.clone());

        let config = AuthConfig::new(passkey)
            .with_identity_model(self.identity_model)
            .with_verification(
                VerificationConfig::new().with_log_codes(self.log_verification_codes),
            )
            .with_session(
                SessionConfig::new().with_ttl(chrono::Duration::seconds(self.session_ttl_seconds)),
            );

        match &self.login_url {
            Some(url) => config.with_login_url(url.clone()),
            None => config,
        }
    }
}

/// The error worth reporting from loading a `.env` file.
///
/// A missing file is normal and yields `None`.
pub fn env_file_error<T>(result: dotenvy::Result<T>) -> Option<dotenvy::Error> {
    match result {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("invalid boolean `{other}`"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgres://localhost/auth"),
        ("REDIS_ADDR", "localhost:6379"),
        ("RP_ID", "example.com"),
        ("RP_ORIGIN", "https://auth.example.com"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(REQUIRED).unwrap();

        assert_eq!(config.addr, "0.0.0.0:8081");
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.rp_name, "Auth");
        assert_eq!(config.identity_model, IdentityModel::EmailVerified);
        assert_eq!(config.postgres.max_connections, 10);
        assert!(config.postgres.run_migrations);
        assert!(!config.log_verification_codes);
        assert!(config.smtp.is_none());

        let auth = config.auth_config();
        assert!(auth.cookies.secure);
        assert_eq!(auth.session.ttl, chrono::Duration::hours(24));
        assert_eq!(auth.cookies.login_url, None);
    }

    #[test]
    fn test_missing_required_is_error() {
        let err = load(&REQUIRED[1..]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let err = load(&[REQUIRED[0], REQUIRED[2], REQUIRED[3]]).unwrap_err();
        assert!(err.to_string().contains("REDIS"));
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("ADDR", ":9000"),
            ("REDIS_URL", "redis://cache:6380/1"),
            ("IDENTITY_MODEL", "credential"),
            ("SESSION_TTL_SECONDS", "60"),
            ("LOGIN_URL", "https://auth.example.com/login"),
            ("LOG_VERIFICATION_CODES", "true"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_FROM", "Auth <noreply@example.com>"),
        ]);
        let config = load(&vars).unwrap();

        assert_eq!(config.addr, "0.0.0.0:9000");
        assert_eq!(config.redis_url, "redis://cache:6380/1");
        assert_eq!(config.identity_model, IdentityModel::CredentialIsIdentity);
        let smtp = config.smtp.as_ref().unwrap();
        assert_eq!(smtp.port, 587);
        assert!(smtp.credentials.is_none());

        let auth = config.auth_config();
        assert_eq!(auth.session.ttl, chrono::Duration::minutes(15));
        assert_eq!(auth.cookies.login_url.as_deref(), Some("https://auth.example.com/login"));
        assert!(auth.verification.log_codes);
    }

    #[test]
    fn test_env_file_errors() {
        let missing = std::env::temp_dir().join("passkey-gate-missing.env");
        assert!(env_file_error(dotenvy::from_path(&missing)).is_none());

        let malformed =
            std::env::temp_dir().join(format!("passkey-gate-{}.env", std::process::id()));
        std::fs::write(&malformed, "RP_NAME='unterminated\n").unwrap();
        let err = env_file_error(dotenvy::from_path(&malformed));
        std::fs::remove_file(&malformed).unwrap();
        assert!(err.is_some());
    }

    #[test]
    fn test_invalid_values() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("IDENTITY_MODEL", "ldap"));
        assert!(load(&vars).is_err());

        let mut vars = REQUIRED.to_vec();
        vars.push(("RUN_MIGRATIONS", "maybe"));
        assert!(load(&vars).is_err());
    }
}
