/// Worker configuration
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 5)
/// - `EMAIL_TOKEN_SECRET`: Key for verification links; must match the API (falls back to `JWT_SECRET`)
/// - `EMAIL_TOKEN_TTL_HOURS`: Verification link lifetime (default: 72)
/// - `PUBLIC_DOMAIN`: Base URL put in verification links (default: http://localhost:8080)
/// - `MAIL_FROM`: Sender address (default: noreply@estatehub.com)
/// - `MAIL_BACKEND`: `console` or `http` (default: console)
/// - `MAIL_HTTP_URL`: Relay endpoint, required for the `http` backend
/// - `MAIL_HTTP_TOKEN`: Bearer token for the relay
/// - `WORKER_POLL_INTERVAL_SECS`: Idle poll interval (default: 2)
/// - `WORKER_BATCH_SIZE`: Jobs claimed per poll (default: 10)
/// - `WORKER_MAX_ATTEMPTS`: Deliveries tried before a job fails (default: 5)
/// - `WORKER_STALE_AFTER_SECS`: Running jobs older than this are requeued (default: 300)

use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub email_token_secret: String,
    pub email_token_ttl_hours: i64,

    /// Scheme and host, without a trailing slash
    pub public_domain: String,

    pub mail_from: String,
    pub backend: MailBackend,
    pub poll_interval: Duration,
    pub batch_size: i64,
    pub max_attempts: i32,
    pub stale_after: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailBackend {
    /// Log messages instead of sending them
    Console,

    /// POST each message as JSON to a relay
    Http { url: String, token: Option<String> },
}

fn parse_or<T: FromStr>(value: Option<String>, name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match value.filter(|v| !v.trim().is_empty()) {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, v, e)),
    }
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_vars(|name| env::var(name).ok())
    }

    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = var("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let email_token_secret = var("EMAIL_TOKEN_SECRET")
            .or_else(|| var("JWT_SECRET"))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("EMAIL_TOKEN_SECRET (or JWT_SECRET) is required"))?;

        let backend = match var("MAIL_BACKEND")
            .unwrap_or_else(|| "console".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "console" => MailBackend::Console,
            "http" => MailBackend::Http {
                url: var("MAIL_HTTP_URL")
                    .filter(|u| !u.trim().is_empty())
                    .ok_or_else(|| anyhow::anyhow!("MAIL_HTTP_URL is required for the http backend"))?,
                token: var("MAIL_HTTP_TOKEN").filter(|t| !t.trim().is_empty()),
            },
            other => anyhow::bail!("MAIL_BACKEND has an invalid value '{}'", other),
        };

        let batch_size: i64 = parse_or(var("WORKER_BATCH_SIZE"), "WORKER_BATCH_SIZE", 10)?;
        let max_attempts: i32 = parse_or(var("WORKER_MAX_ATTEMPTS"), "WORKER_MAX_ATTEMPTS", 5)?;
        if batch_size < 1 || max_attempts < 1 {
            anyhow::bail!("WORKER_BATCH_SIZE and WORKER_MAX_ATTEMPTS must be at least 1");
        }

        Ok(Self {
            database_url,
            max_connections: parse_or(var("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 5)?,
            email_token_secret,
            email_token_ttl_hours: parse_or(var("EMAIL_TOKEN_TTL_HOURS"), "EMAIL_TOKEN_TTL_HOURS", 72)?,
            public_domain: var("PUBLIC_DOMAIN")
                .unwrap_or_else(|| "http://localhost:8080".to_string())
                .trim_end_matches('/')
                .to_string(),
            mail_from: var("MAIL_FROM").unwrap_or_else(|| "noreply@estatehub.com".to_string()),
            backend,
            poll_interval: Duration::from_secs(parse_or(
                var("WORKER_POLL_INTERVAL_SECS"),
                "WORKER_POLL_INTERVAL_SECS",
                2,
            )?),
            batch_size,
            max_attempts,
            stale_after: Duration::from_secs(parse_or(
                var("WORKER_STALE_AFTER_SECS"),
                "WORKER_STALE_AFTER_SECS",
                300,
            )?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<WorkerConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/estatehub"),
            ("JWT_SECRET", "shared-secret"),
        ])
        .unwrap();

        assert_eq!(config.email_token_secret, "shared-secret");
        assert_eq!(config.email_token_ttl_hours, 72);
        assert_eq!(config.public_domain, "http://localhost:8080");
        assert_eq!(config.backend, MailBackend::Console);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn test_http_backend() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/estatehub"),
            ("EMAIL_TOKEN_SECRET", "email-secret"),
            ("JWT_SECRET", "jwt-secret"),
            ("PUBLIC_DOMAIN", "https://estatehub.example/"),
            ("MAIL_BACKEND", "HTTP"),
            ("MAIL_HTTP_URL", "https://relay.example/send"),
            ("MAIL_HTTP_TOKEN", "relay-token"),
        ])
        .unwrap();

        assert_eq!(config.email_token_secret, "email-secret");
        assert_eq!(config.public_domain, "https://estatehub.example");
        assert_eq!(
            config.backend,
            MailBackend::Http {
                url: "https://relay.example/send".to_string(),
                token: Some("relay-token".to_string()),
            }
        );
    }

    #[test]
    fn test_invalid_values() {
        let base = [
            ("DATABASE_URL", "postgresql://localhost/estatehub"),
            ("JWT_SECRET", "shared-secret"),
        ];

        assert!(load(&[("JWT_SECRET", "shared-secret")]).is_err());
        assert!(load(&[("DATABASE_URL", "postgresql://localhost/estatehub")]).is_err());

        let mut vars = base.to_vec();
        vars.push(("MAIL_BACKEND", "http"));
        assert!(load(&vars).unwrap_err().to_string().contains("MAIL_HTTP_URL"));

        let mut vars = base.to_vec();
        vars.push(("MAIL_BACKEND", "smtp"));
        assert!(load(&vars).is_err());

        let mut vars = base.to_vec();
        vars.push(("WORKER_BATCH_SIZE", "0"));
        assert!(load(&vars).is_err());
    }
}
