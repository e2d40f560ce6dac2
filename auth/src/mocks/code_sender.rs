//! Recording code sender for testing.

use crate::error::{AuthError, Result};
use crate::providers::CodeSender;
use chrono::Duration;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A delivered verification code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCode {
    /// Recipient.
    pub to: String,
    /// Code.
    pub code: String,
}

/// Captures every code instead of delivering it.
#[derive(Clone, Default)]
pub struct RecordingCodeSender {
    sent: Arc<Mutex<Vec<SentCode>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingCodeSender {
    /// Create a new recording sender.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Everything sent so far, oldest first.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    #[must_use]
    pub fn sent(&self) -> Vec<SentCode> {
        self.sent.lock().unwrap().clone()
    }

    /// Most recent code sent to `to`.
    #[must_use]
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|s| s.to == to)
            .map(|s| s.code)
    }
}

impl CodeSender for RecordingCodeSender {
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    async fn send_verification_code(&self, to: &str, code: &str, _valid_for: Duration) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AuthError::DeliveryError("mock delivery failure".into()));
        }
        self.sent.lock().unwrap().push(SentCode {
            to: to.to_string(),
            code: code.to_string(),
        });
        Ok(())
    }
}
