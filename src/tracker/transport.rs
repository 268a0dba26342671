//! HTTP transport to trackers
//!
//! Announces go through [`TrackerTransport`] so schedulers can be driven
//! by a stub in tests.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::USER_AGENT;
use tracing::debug;

use crate::error::{Result, SeederError};

/// Performs one GET against a tracker and returns the raw body
#[async_trait]
pub trait TrackerTransport: Send + Sync {
    async fn get(&self, url: &str, user_agent: &str) -> Result<Bytes>;
}

/// reqwest-backed transport. Gzip bodies are inflated transparently.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = client_builder(timeout)
            .build()
            .map_err(|e| SeederError::config_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Use an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Client settings every announce goes out with. `gzip` makes reqwest send
/// `Accept-Encoding: gzip` and inflate the body.
fn client_builder(timeout: Duration) -> reqwest::ClientBuilder {
    reqwest::Client::builder().timeout(timeout).gzip(true)
}

#[async_trait]
impl TrackerTransport for HttpTransport {
    async fn get(&self, url: &str, user_agent: &str) -> Result<Bytes> {
        debug!("GET {}", url);
        let response = self.client.get(url).header(USER_AGENT, user_agent).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SeederError::network_failure_with_address(
                format!("Tracker answered HTTP {}", status),
                url,
            ));
        }

        Ok(response.bytes().await?)
    }
}
