//! SMTP code sender implementation using Lettre.

use crate::error::{AuthError, Result};
use crate::providers::CodeSender;
use chrono::Duration;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// SMTP code sender using Lettre.
///
/// # Configuration
///
/// - `smtp_server`: SMTP server address (e.g., "smtp.gmail.com")
/// - `smtp_port`: SMTP server port (usually 587 for STARTTLS)
/// - `credentials`: Optional SMTP username and password
/// - `from`: Sender mailbox (e.g., "Auth <noreply@example.com>")
///
/// # Examples
///
/// ```ignore
/// use passkey_gate_auth::providers::SmtpCodeSender;
///
/// let sender = SmtpCodeSender::new(
///     "smtp.example.com".to_string(),
///     587,
///     Some(("user".to_string(), "app_password".to_string())),
///     "Auth <noreply@example.com>".to_string(),
/// );
/// ```
#[derive(Clone)]
pub struct SmtpCodeSender {
    /// SMTP server address.
    smtp_server: String,

    /// SMTP server port.
    smtp_port: u16,

    /// SMTP credentials.
    credentials: Option<Credentials>,

    /// Sender mailbox.
    from: String,
}

impl SmtpCodeSender {
    /// Create a new SMTP code sender.
    #[must_use]
    pub fn new(
        smtp_server: String,
        smtp_port: u16,
        credentials: Option<(String, String)>,
        from: String,
    ) -> Self {
        Self {
            smtp_server,
            smtp_port,
            credentials: credentials.map(|(user, pass)| Credentials::new(user, pass)),
            from,
        }
    }

    /// Build SMTP transport for sending emails.
    ///
    /// # Errors
    ///
    /// Returns error if the relay address is invalid.
    fn build_transport(&self) -> Result<SmtpTransport> {
        let mut builder = SmtpTransport::starttls_relay(&self.smtp_server)
            .map_err(|e| AuthError::DeliveryError(format!("SMTP relay error: {e}")))?
            .port(self.smtp_port);

        if let Some(credentials) = &self.credentials {
            builder = builder.credentials(credentials.clone());
        }

        Ok(builder.build())
    }

    /// Build the message for a code.
    ///
    /// # Errors
    ///
    /// Returns error if either mailbox does not parse.
    fn build_message(&self, to: &str, code: &str, valid_for: Duration) -> Result<Message> {
        let minutes = valid_for.num_minutes();
        let body = format!(
            "Your verification code is {code}\n\n\
             It expires in {minutes} minutes. If you did not try to register, ignore this email.\n"
        );

        Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| AuthError::DeliveryError(format!("Invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| AuthError::DeliveryError(format!("Invalid to address: {e}")))?)
            .subject(format!("Verification code: {code}"))
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| AuthError::DeliveryError(format!("Failed to build email: {e}")))
    }
}

impl CodeSender for SmtpCodeSender {
    async fn send_verification_code(&self, to: &str, code: &str, valid_for: Duration) -> Result<()> {
        let email = self.build_message(to, code, valid_for)?;
        let mailer = self.build_transport()?;

        // lettre's SmtpTransport is blocking
        tokio::task::spawn_blocking(move || {
            mailer
                .send(&email)
                .map_err(|e| AuthError::DeliveryError(format!("Failed to send email: {e}")))
        })
        .await
        .map_err(|e| AuthError::DeliveryError(format!("Email task failed: {e}")))??;

        tracing::info!(to = %to, "Verification code emailed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> SmtpCodeSender {
        SmtpCodeSender::new(
            "smtp.example.com".into(),
            587,
            None,
            "Auth <noreply@example.com>".into(),
        )
    }

    #[test]
    fn test_message_builds() {
        let message = sender().build_message("alice@example.com", "123456", Duration::minutes(10));
        assert!(message.is_ok());
    }

    #[test]
    fn test_bad_recipient_is_delivery_error() {
        let message = sender().build_message("not an address", "123456", Duration::minutes(10));
        assert!(matches!(message, Err(AuthError::DeliveryError(_))));
    }
}
