/// Mail backends
///
/// A [`Mailer`] takes a fully rendered [`Email`] and delivers it. Backends
/// never retry; a returned error sends the job back to the queue.
///
/// # Available Backends
///
/// - `console`: logs the message (development)
/// - `http`: POSTs the message to a mail relay

pub mod console;
pub mod http;

pub use console::ConsoleMailer;
pub use http::HttpMailer;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::config::MailBackend;

/// A rendered plain-text message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail request failed: {0}")]
    Transport(String),

    #[error("Mail relay rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Backend name, for logs
    fn name(&self) -> &str;

    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Builds the configured backend
pub fn from_backend(backend: &MailBackend) -> Result<Arc<dyn Mailer>, MailError> {
    Ok(match backend {
        MailBackend::Console => Arc::new(ConsoleMailer::new()),
        MailBackend::Http { url, token } => Arc::new(HttpMailer::new(url, token.clone())?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_backend() {
        let console = from_backend(&MailBackend::Console).unwrap();
        assert_eq!(console.name(), "console");

        let http = from_backend(&MailBackend::Http {
            url: "https://relay.example/send".to_string(),
            token: None,
        })
        .unwrap();
        assert_eq!(http.name(), "http");
    }
}
