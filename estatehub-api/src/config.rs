/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `API_PRODUCTION`: Enables HSTS (default: false)
/// - `CORS_ORIGINS`: Comma-separated origins, `*` for any (default: *)
/// - `API_TRUSTED_PROXY_HOPS`: Reverse proxies whose `X-Forwarded-For` entries are trusted (default: 0)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Secret key for JWT signing, at least 32 characters (required)
/// - `JWT_ACCESS_TTL_HOURS`: Access token lifetime (default: 24)
/// - `JWT_REFRESH_TTL_DAYS`: Refresh token lifetime (default: 30)
/// - `EMAIL_TOKEN_SECRET`: Key for email verification links (default: `JWT_SECRET`)
/// - `EMAIL_TOKEN_TTL_HOURS`: Verification link lifetime (default: 72)
/// - `AUTH_REQUIRE_VERIFIED_EMAIL`: Refuse logins until the email is verified (default: false)
/// - `TWO_FACTOR_RATE_PER_MINUTE`: `/token/code` attempts per client IP (default: 5)
/// - `GEOCODER_URL`: Nominatim base URL
/// - `GEOCODER_COUNTRY`: ISO country codes to restrict searches to (default: gb)
/// - `GEOCODER_USER_AGENT`: User-Agent sent to the geocoder
/// - `FACEBOOK_GRAPH_URL`: Graph API base URL
/// - `FACEBOOK_ACCESS_TOKEN`: App token used to inspect user tokens (social login disabled if unset)
/// - `FACEBOOK_APP_ID`: App that user tokens must be issued to (default: the `app_id|secret` token prefix)
///
/// # Example
///
/// ```no_run
/// use estatehub_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use chrono::Duration;
use estatehub_shared::auth::jwt::TokenLifetimes;
use std::env;
use std::str::FromStr;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub auth: AuthConfig,
    pub geocoder: GeocoderConfig,
    pub facebook: FacebookConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Whether HTTPS-only headers are sent
    pub production: bool,

    pub cors_origins: Vec<String>,

    /// Reverse proxies in front of the API; 0 means the socket peer is the client
    pub trusted_proxy_hops: usize,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    pub access_ttl_hours: i64,
    pub refresh_ttl_days: i64,
}

impl JwtConfig {
    pub fn lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            access: Duration::hours(self.access_ttl_hours),
            refresh: Duration::days(self.refresh_ttl_days),
        }
    }
}

/// Login policy and email verification
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub email_token_secret: String,
    pub email_token_ttl_hours: i64,
    pub require_verified_email: bool,
    pub two_factor_rate_per_minute: u32,
}

/// Nominatim settings
#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub url: String,
    pub country: Option<String>,
    pub user_agent: String,
}

/// Facebook Graph API settings
#[derive(Debug, Clone)]
pub struct FacebookConfig {
    pub graph_url: String,
    pub access_token: Option<String>,

    /// Tokens issued to any other app are refused
    pub app_id: Option<String>,
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

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_vars(|name| env::var(name).ok())
    }

    /// Builds configuration from any variable source
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = var("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let jwt_secret = var("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let cors_origins = var("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let access_ttl_hours: i64 = parse_or(var("JWT_ACCESS_TTL_HOURS"), "JWT_ACCESS_TTL_HOURS", 24)?;
        let refresh_ttl_days: i64 = parse_or(var("JWT_REFRESH_TTL_DAYS"), "JWT_REFRESH_TTL_DAYS", 30)?;
        if access_ttl_hours <= 0 || refresh_ttl_days <= 0 {
            anyhow::bail!("JWT lifetimes must be positive");
        }

        let two_factor_rate_per_minute: u32 =
            parse_or(var("TWO_FACTOR_RATE_PER_MINUTE"), "TWO_FACTOR_RATE_PER_MINUTE", 5)?;
        if two_factor_rate_per_minute == 0 {
            anyhow::bail!("TWO_FACTOR_RATE_PER_MINUTE must be at least 1");
        }

        let facebook_token = var("FACEBOOK_ACCESS_TOKEN").filter(|t| !t.trim().is_empty());

        Ok(Self {
            api: ApiConfig {
                host: var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(var("API_PORT"), "API_PORT", 8080)?,
                production: parse_or(var("API_PRODUCTION"), "API_PRODUCTION", false)?,
                cors_origins,
                trusted_proxy_hops: parse_or(
                    var("API_TRUSTED_PROXY_HOPS"),
                    "API_TRUSTED_PROXY_HOPS",
                    0,
                )?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_or(
                    var("DATABASE_MAX_CONNECTIONS"),
                    "DATABASE_MAX_CONNECTIONS",
                    10,
                )?,
            },
            auth: AuthConfig {
                email_token_secret: var("EMAIL_TOKEN_SECRET").unwrap_or_else(|| jwt_secret.clone()),
                email_token_ttl_hours: parse_or(
                    var("EMAIL_TOKEN_TTL_HOURS"),
                    "EMAIL_TOKEN_TTL_HOURS",
                    72,
                )?,
                require_verified_email: parse_or(
                    var("AUTH_REQUIRE_VERIFIED_EMAIL"),
                    "AUTH_REQUIRE_VERIFIED_EMAIL",
                    false,
                )?,
                two_factor_rate_per_minute,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                access_ttl_hours,
                refresh_ttl_days,
            },
            geocoder: GeocoderConfig {
                url: var("GEOCODER_URL")
                    .unwrap_or_else(|| "https://nominatim.openstreetmap.org".to_string()),
                country: Some(var("GEOCODER_COUNTRY").unwrap_or_else(|| "gb".to_string()))
                    .filter(|c| !c.trim().is_empty()),
                user_agent: var("GEOCODER_USER_AGENT").unwrap_or_else(|| {
                    format!("estatehub/{}", env!("CARGO_PKG_VERSION"))
                }),
            },
            facebook: FacebookConfig {
                graph_url: var("FACEBOOK_GRAPH_URL")
                    .unwrap_or_else(|| "https://graph.facebook.com".to_string()),
                app_id: var("FACEBOOK_APP_ID")
                    .or_else(|| {
                        facebook_token
                            .as_deref()
                            .and_then(|t| t.split_once('|'))
                            .map(|(app_id, _)| app_id.to_string())
                    })
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty()),
                access_token: facebook_token,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
