//! Profile API client
//!
//! Fetches a player's full profile document from the profile-get endpoint.
//! Every request asks for the same fixed set of sections so that stored
//! snapshots always have the same shape.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{ProfileSource, UpstreamError};
use crate::cache::Username;
use crate::config::UpstreamConfig;
use crate::snapshot::Snapshot;

/// Default profile-get endpoint
pub const DEFAULT_PROFILE_URL: &str = "https://esplay.com/api/profile/get";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Profile sections requested on every call, each sent as `<flag>=1`
pub const PROFILE_FLAGS: [&str; 14] = [
    "teams",
    "friends",
    "header",
    "followers",
    "medals",
    "game_stats",
    "game_id",
    "level_history",
    "clips",
    "twitch",
    "steam",
    "spaces",
    "username_history",
    "item_drops",
];

/// Longest slice of an error body kept in `UpstreamError::Status`
const MAX_ERROR_BODY: usize = 200;

/// Client for the upstream profile API
#[derive(Debug, Clone)]
pub struct ProfileClient {
    client: Client,
    base_url: String,
}

impl ProfileClient {
    /// Creates a client for the default endpoint with the default timeout
    pub fn new() -> Result<Self, UpstreamError> {
        Self::from_config(&UpstreamConfig::default())
    }

    /// Creates a client from upstream settings
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("statkeeper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, config.base_url.clone()))
    }

    /// Creates a client with a custom HTTP client and endpoint
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn query(username: &Username) -> Vec<(&str, &str)> {
        let mut query = Vec::with_capacity(PROFILE_FLAGS.len() + 1);
        query.push(("username", username.as_str()));
        query.extend(PROFILE_FLAGS.iter().map(|flag| (*flag, "1")));
        query
    }

    /// Fetches the profile document for `username`
    ///
    /// # Returns
    /// * `Ok(Snapshot)` - the response body as an opaque JSON document
    /// * `Err(UpstreamError)` - non-success status, transport failure, or a
    ///   body that is not JSON
    pub async fn fetch(&self, username: &Username) -> Result<Snapshot, UpstreamError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&Self::query(username))
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        serde_json::from_slice(&body).map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ProfileSource for ProfileClient {
    async fn fetch_profile(&self, username: &Username) -> Result<Snapshot, UpstreamError> {
        self.fetch(username).await
    }
}

fn error_message(status: reqwest::StatusCode, body: &[u8]) -> String {
    let reason = status.canonical_reason().unwrap_or("unknown status");
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return reason.to_string();
    }
    let excerpt: String = text.chars().take(MAX_ERROR_BODY).collect();
    format!("{}: {}", reason, excerpt)
}
