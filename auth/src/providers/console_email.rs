//! Console code sender for development and single-operator deployments.

use crate::error::Result;
use crate::providers::CodeSender;
use chrono::Duration;
use tracing::{info, warn};

/// Logs verification codes instead of emailing them.
///
/// With `log_codes` off the code is dropped and a warning records that it was
/// not delivered, so registration can only be completed by an operator who
/// enables code logging.
///
/// # Examples
///
/// ```ignore
/// use passkey_gate_auth::providers::ConsoleCodeSender;
///
/// let sender = ConsoleCodeSender::new(true);
/// sender.send_verification_code("user@example.com", "042917", Duration::minutes(10)).await?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct ConsoleCodeSender {
    log_codes: bool,
}

impl ConsoleCodeSender {
    /// Create a console sender.
    #[must_use]
    pub const fn new(log_codes: bool) -> Self {
        Self { log_codes }
    }
}

impl CodeSender for ConsoleCodeSender {
    async fn send_verification_code(&self, to: &str, code: &str, valid_for: Duration) -> Result<()> {
        if self.log_codes {
            info!(
                to = %to,
                code = %code,
                valid_minutes = valid_for.num_minutes(),
                "Verification code"
            );
        } else {
            warn!(
                to = %to,
                "Email sending not configured, verification code was not delivered"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_console_sender_never_fails() {
        for log_codes in [true, false] {
            let sender = ConsoleCodeSender::new(log_codes);
            let result = sender
                .send_verification_code("a@example.com", "000001", Duration::minutes(10))
                .await;
            assert!(result.is_ok());
        }
    }
}
