//! Verification code delivery trait.

use crate::error::Result;
use chrono::Duration;

/// Delivers email verification codes.
///
/// The code must never be echoed in an HTTP response; this channel is the
/// only way it reaches the user.
pub trait CodeSender: Send + Sync {
    /// Deliver `code` to `to`.
    ///
    /// # Arguments
    ///
    /// - `to`: Recipient email address (normalized)
    /// - `code`: 6-digit verification code
    /// - `valid_for`: How long the code stays valid
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DeliveryError`](crate::AuthError::DeliveryError)
    /// if the message could not be handed off.
    fn send_verification_code(
        &self,
        to: &str,
        code: &str,
        valid_for: Duration,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
