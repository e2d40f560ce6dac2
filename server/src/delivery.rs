//! Verification code delivery chosen at startup.

use crate::config::SmtpConfig;
use chrono::Duration;
use passkey_gate_auth::providers::{CodeSender, ConsoleCodeSender, SmtpCodeSender};

/// SMTP when configured, otherwise the console.
#[derive(Clone)]
pub enum CodeDelivery {
    /// Email via SMTP.
    Smtp(SmtpCodeSender),
    /// Log (or drop) the code.
    Console(ConsoleCodeSender),
}

impl CodeDelivery {
    /// Pick a sender from configuration.
    #[must_use]
    pub fn new(smtp: Option<&SmtpConfig>, log_codes: bool) -> Self {
        match smtp {
            Some(smtp) => {
                tracing::info!(host = %smtp.host, port = smtp.port, "Verification codes sent by SMTP");
                Self::Smtp(SmtpCodeSender::new(
                    smtp.host.clone(),
                    smtp.port,
                    smtp.credentials.clone(),
                    smtp.from.clone(),
                ))
            }
            None => {
                if !log_codes {
                    tracing::warn!(
                        "No SMTP_HOST and LOG_VERIFICATION_CODES is off: verification codes will not be delivered"
                    );
                }
                Self::Console(ConsoleCodeSender::new(log_codes))
            }
        }
    }
}

impl CodeSender for CodeDelivery {
    async fn send_verification_code(
        &self,
        to: &str,
        code: &str,
        valid_for: Duration,
    ) -> passkey_gate_auth::Result<()> {
        match self {
            Self::Smtp(sender) => sender.send_verification_code(to, code, valid_for).await,
            Self::Console(sender) => sender.send_verification_code(to, code, valid_for).await,
        }
    }
}
