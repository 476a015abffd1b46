// src/ingest/client.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

/// Default per-request timeout for outbound source calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed body from {url}: {reason}")]
    Body { url: String, reason: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. } | Self::Status { url, .. } | Self::Body { url, .. } => url,
        }
    }
}

/// A remote source returning structured records. One call, no retry.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<serde_json::Value, FetchError>;
}

/// `reqwest`-backed client shared by all collectors of a run.
#[derive(Clone)]
pub struct HttpSourceClient {
    client: Client,
    timeout: Duration,
}

impl HttpSourceClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for HttpSourceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn fetch(&self, url: &str) -> Result<serde_json::Value, FetchError> {
        let rsp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = rsp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Content-Type is not trusted; some endpoints send JSON as text/html.
        let body = rsp.bytes().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
