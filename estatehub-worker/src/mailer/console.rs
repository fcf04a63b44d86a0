/// Console mail backend
///
/// Writes each message to the log at `info` level. Verification links and
/// 2FA codes show up in the worker output, which is what local development
/// needs.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{Email, MailError, Mailer};

#[derive(Debug, Default)]
pub struct ConsoleMailer {
    sent: AtomicU64,
}

impl ConsoleMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages written so far
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, email: &Email) -> Result<(), MailError> {
        tracing::info!(
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            "\n{}",
            email.body
        );
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
