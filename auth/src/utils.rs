//! Utility functions for authentication.

use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Validate email address format.
///
/// This performs basic RFC 5322 validation:
/// - Must contain exactly one `@`
/// - Must have non-empty local and domain parts
/// - Length must be between 3 and 255 characters
///
/// # Examples
///
/// ```
/// use passkey_gate_auth::utils::is_valid_email;
///
/// assert!(is_valid_email("user@example.com"));
/// assert!(is_valid_email("user+tag@subdomain.example.com"));
/// assert!(!is_valid_email("invalid"));
/// assert!(!is_valid_email("@example.com"));
/// assert!(!is_valid_email("user@"));
/// ```
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 3 || email.len() > 255 {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }

    if !domain.contains('.') {
        return false;
    }

    let valid_local_chars =
        |c: char| c.is_alphanumeric() || c == '.' || c == '-' || c == '+' || c == '_';
    let valid_domain_chars = |c: char| c.is_alphanumeric() || c == '.' || c == '-';

    if !local.chars().all(valid_local_chars) || !domain.chars().all(valid_domain_chars) {
        return false;
    }

    // Domain parts between dots must be non-empty
    domain.split('.').all(|part| !part.is_empty())
}

/// Trim and lowercase an email address.
///
/// ```
/// use passkey_gate_auth::utils::normalize_email;
///
/// assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
/// ```
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Generate a 6-digit numeric verification code, zero-padded.
#[must_use]
pub fn generate_verification_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:06}")
}

/// Generate an opaque secret: 32 random bytes, base64url without padding.
///
/// Used for ceremony session IDs, session tokens and API token secrets.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 digest of a secret, base64url without padding.
///
/// API tokens are stored and looked up by this digest.
#[must_use]
pub fn digest_secret(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("user.name@example.com"));
        assert!(is_valid_email("user+tag@example.com"));
        assert!(is_valid_email("user_name@subdomain.example.com"));
        assert!(is_valid_email("user-name@example.co.uk"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email("invalid"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@@example.com"));
        assert!(!is_valid_email("user@.com"));
        assert!(!is_valid_email("user@example."));
        assert!(!is_valid_email("user@example..com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_verification_code_shape() {
        for _ in 0..200 {
            let code = generate_verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_secret_is_random_and_long() {
        let a = generate_secret();
        let b = generate_secret();
        assert_ne!(a, b);
        // 32 bytes -> 43 base64url characters
        assert_eq!(a.len(), 43);
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(digest_secret("abc"), digest_secret("abc"));
        assert_ne!(digest_secret("abc"), digest_secret("abd"));
        assert_ne!(digest_secret("abc"), "abc");
    }
}
