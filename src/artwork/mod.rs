//! Cover artwork fetching and embedding.
//!
//! Covers are requested through the host's own image proxy at a fixed size
//! and turned into data URLs, so consumers outside the host process never
//! need network access of their own.

use std::time::Duration;

use {
    async_trait::async_trait,
    reqwest::{Client, header::CONTENT_TYPE},
    tracing::debug,
};

use crate::error::ArtworkError;

mod cache;
mod resolver;
mod transcode;

pub use {
    cache::ArtworkCache,
    resolver::{CoverCallback, CoverResolver},
    transcode::{MimeType, cover_proxy_url, detect_mime_type, to_data_url},
};

/// User agent of the host desktop client; the image proxy rejects unknown agents.
pub const HOST_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Safari/537.36 Chrome/91.0.4472.164 NeteaseMusicDesktop/3.1.23.204750";

/// Raw HTTP response for an image request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Source of cover image bytes.
#[async_trait]
pub trait ArtworkFetcher: Send + Sync {
    /// Fetches the image at `url`.
    ///
    /// # Errors
    ///
    /// Returns `ArtworkError::Http` if the request could not complete.
    async fn fetch(&self, url: &str) -> Result<FetchedImage, ArtworkError>;
}

/// [`ArtworkFetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpArtworkFetcher {
    client: Client,
}

impl HttpArtworkFetcher {
    /// Builds a client with the host user agent and a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `ArtworkError::Http` if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, ArtworkError> {
        let client = Client::builder()
            .user_agent(HOST_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtworkFetcher for HttpArtworkFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, ArtworkError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        debug!(url, status, bytes = bytes.len(), "Fetched cover");

        Ok(FetchedImage {
            status,
            content_type,
            bytes,
        })
    }
}
