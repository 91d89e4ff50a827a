//! Transport seam for artifact downloads.
//!
//! The resolver talks to remote repositories exclusively through the
//! [`ArtifactFetcher`] trait, so tests can substitute an in-memory stub and
//! assert on call order without any network access.

use std::time::Duration;

use async_trait::async_trait;

use super::error::{ArtifactError, ArtifactResult};

/// Outcome of fetching a single URL.
///
/// A 404-equivalent is data, not an error: the resolver falls through to the
/// next endpoint on both `NotFound` and transport errors, but only transport
/// errors carry a reason worth logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The resource exists; full body.
    Found(Vec<u8>),
    /// The endpoint answered but does not have the resource.
    NotFound,
}

/// Abstraction over the download transport.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Fetch a URL. Timeouts and request failures are errors; a missing
    /// resource is [`FetchOutcome::NotFound`].
    async fn fetch(&self, url: &str) -> ArtifactResult<FetchOutcome>;
}

/// HTTP fetcher backed by reqwest, built once per process.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a bounded per-request timeout.
    pub fn new(timeout: Duration) -> ArtifactResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("catagen/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ArtifactError::Network(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> ArtifactResult<FetchOutcome> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ArtifactError::Network(format!("{url}: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(FetchOutcome::NotFound);
        }

        let response = response
            .error_for_status()
            .map_err(|e| ArtifactError::Network(format!("{url}: {e}")))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ArtifactError::Network(format!("{url}: failed to read body: {e}")))?;

        Ok(FetchOutcome::Found(bytes.to_vec()))
    }
}
