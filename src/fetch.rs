//! HTTP fetching behind a trait so the download stage can be tested without a network.

use crate::config::Config;
use crate::error::{FetchError, Result};
use std::time::Duration;

/// Time allowed for establishing a TCP/TLS connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Abstraction over "GET this URL and give me the body".
///
/// Implementations do not need to observe cancellation themselves: the download
/// stage races every call against the shutdown context and drops the future
/// when it fires.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` and return the full body, or why it could not be fetched
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

/// Production [`Fetcher`] backed by a shared `reqwest` client
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client using the configured user agent
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let parsed = url::Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let response = self.client.get(parsed).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        Ok(body.to_vec())
    }
}
