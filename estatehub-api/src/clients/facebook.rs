/// Social identity verification
///
/// A client sends the access token it got from Facebook Login. The server
/// inspects it with the Graph API `debug_token` endpoint using the app's own
/// access token, and trusts the returned `user_id` only when the token is
/// valid, belongs to a user and was issued to this app.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::FacebookConfig;

#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    #[error("Social login is not configured")]
    NotConfigured,

    /// The Graph API reported an error about the token
    #[error("{0}")]
    Rejected(String),

    /// Token inspected fine but is expired, revoked, not a user token or
    /// issued to another app
    #[error("Invalid social token")]
    InvalidToken,

    #[error("Graph API request failed: {0}")]
    Request(String),

    #[error("Graph API response could not be decoded: {0}")]
    Decode(String),
}

/// Maps a social access token to the provider's user ID
#[async_trait]
pub trait SocialVerifier: Send + Sync {
    async fn facebook_user_id(&self, token: &str) -> Result<String, SocialError>;
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct TokenData {
    app_id: Option<String>,
    #[serde(default)]
    is_valid: bool,
    #[serde(rename = "type")]
    token_type: Option<String>,
    user_id: Option<String>,
    error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
struct DebugTokenResponse {
    data: Option<TokenData>,
    error: Option<GraphError>,
}

fn user_id_from_response(response: DebugTokenResponse, app_id: &str) -> Result<String, SocialError> {
    if let Some(error) = response.error {
        return Err(SocialError::Rejected(error.message));
    }

    let data = response.data.unwrap_or_default();
    if let Some(error) = data.error {
        return Err(SocialError::Rejected(error.message));
    }

    if data.app_id.as_deref() != Some(app_id) {
        return Err(SocialError::InvalidToken);
    }

    match (data.is_valid, data.token_type.as_deref(), data.user_id) {
        (true, Some("USER"), Some(user_id)) if !user_id.is_empty() => Ok(user_id),
        _ => Err(SocialError::InvalidToken),
    }
}

pub struct FacebookVerifier {
    client: Client,
    graph_url: String,
    app_token: Option<String>,
    app_id: Option<String>,
}

impl FacebookVerifier {
    pub fn new(config: &FacebookConfig) -> Result<Self, SocialError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SocialError::Request(e.to_string()))?;

        Ok(Self {
            client,
            graph_url: config.graph_url.trim_end_matches('/').to_string(),
            app_token: config.access_token.clone(),
            app_id: config.app_id.clone(),
        })
    }
}

#[async_trait]
impl SocialVerifier for FacebookVerifier {
    async fn facebook_user_id(&self, token: &str) -> Result<String, SocialError> {
        let (Some(app_token), Some(app_id)) = (self.app_token.as_deref(), self.app_id.as_deref())
        else {
            return Err(SocialError::NotConfigured);
        };

        // Graph API answers 400 with an error body for bad tokens, so the
        // status code is not checked before decoding
        let response: DebugTokenResponse = self
            .client
            .get(format!("{}/debug_token", self.graph_url))
            .query(&[("input_token", token), ("access_token", app_token)])
            .send()
            .await
            .map_err(|e| SocialError::Request(e.to_string()))?
            .json()
            .await
            .map_err(|e| SocialError::Decode(e.to_string()))?;

        let result = user_id_from_response(response, app_id);
        if let Err(e) = &result {
            tracing::info!(error = %e, "Facebook token rejected");
        }
        result
    }
}
