//! Token acquisition for the search channel.
//!
//! The backend accepts WebSocket upgrades only with a session token in the
//! query string. Tokens come from a separate HTTP endpoint in exchange for
//! an api key and are reused across reconnects until they age out.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// A session token together with its acquisition time
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub acquired_at: DateTime<Utc>,
}

impl SessionToken {
    /// Whether the token is past the configured maximum age.
    /// Tokens never expire locally when no maximum is configured.
    pub fn is_expired(&self, max_age_secs: Option<u64>) -> bool {
        match max_age_secs {
            Some(max_age) => {
                let age = Utc::now().signed_duration_since(self.acquired_at);
                age.num_seconds() >= max_age as i64
            }
            None => false,
        }
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    apikey: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// HTTP client for the token endpoint
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    config: AuthConfig,
    timeout_secs: u64,
}

impl AuthClient {
    pub fn new(config: AuthConfig, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            timeout_secs,
        })
    }

    /// Exchange the configured api key for a session token.
    ///
    /// Any non-2xx reply is an authentication failure. The caller decides
    /// whether that is terminal for the channel.
    pub async fn acquire(&self) -> Result<SessionToken> {
        let apikey = self.config.resolve_apikey()?;

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .json(&TokenRequest { apikey: &apikey })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.timeout_secs * 1000)
                } else if e.is_connect() {
                    Error::Transport(format!("Failed to connect to token endpoint: {}", e))
                } else {
                    Error::Transport(format!("Token request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Error::Auth {
                status: status.as_u16(),
                message: if body.is_empty() {
                    "no response body".to_string()
                } else {
                    body
                },
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)?;
        debug!(endpoint = %self.config.endpoint, "Session token acquired");

        Ok(SessionToken {
            token: parsed.token,
            acquired_at: Utc::now(),
        })
    }
}
