use std::time::Duration;

use printwatch_common::api::{DataEnvelope, RegisterRequest, RegisterResponse, RemoteConfig};

#[derive(Debug)]
pub enum SyncError {
    Transport(reqwest::Error),
    /// The server answered with a non-2xx status. Not retried in-cycle;
    /// redelivery happens on the next sync tick.
    Rejected(u16),
    Serialize(serde_json::Error),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Rejected(status) => write!(f, "server rejected request: HTTP {status}"),
            Self::Serialize(e) => write!(f, "serialize: {e}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e)
    }
}

/// Thin HTTP client for the central service. Knows the three endpoints and
/// nothing about cursors or ordering; that lives in the sync engine.
pub struct SyncClient {
    http: reqwest::Client,
    base_url: String,
}

impl SyncClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, SyncError> {
        let response = self
            .http
            .post(format!("{}/agents/register", self.base_url))
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SyncError::Rejected(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }

    pub async fn push(&self, token: &str, envelope: &DataEnvelope) -> Result<(), SyncError> {
        let response = self
            .http
            .post(format!("{}/data", self.base_url))
            .bearer_auth(token)
            .json(envelope)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SyncError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }

    pub async fn pull_config(&self, token: &str) -> Result<RemoteConfig, SyncError> {
        let response = self
            .http
            .get(format!("{}/data/config", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SyncError::Rejected(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}
