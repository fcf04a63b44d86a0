/// HTTP relay mail backend
///
/// Each message is POSTed as JSON to `MAIL_HTTP_URL`:
///
/// ```json
/// {"from": "...", "to": "...", "subject": "...", "body": "..."}
/// ```
///
/// Any 2xx response counts as delivered. When `MAIL_HTTP_TOKEN` is set it is
/// sent as a bearer token.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{Email, MailError, Mailer};

/// Longest relay error body kept in the job's `last_error`
const MAX_ERROR_BODY: usize = 512;

pub struct HttpMailer {
    client: Client,
    url: String,
    token: Option<String>,
}

impl HttpMailer {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

#[async_trait]
impl Mailer for HttpMailer {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let mut request = self.client.post(&self.url).json(email);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(to = %email.to, status = status.as_u16(), "Relay accepted message");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(MailError::Rejected {
            status: status.as_u16(),
            body: truncate(body),
        })
    }
}
