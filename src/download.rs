//! Remote image acquisition
//!
//! Performs a single outbound fetch with a bounded timeout, enforcing the
//! input size ceiling while streaming so an oversized body never fully lands
//! in memory. No retries; any failure maps to [`Error::Download`].

use std::time::Duration;

use futures_util::TryStreamExt;
use reqwest::Client;
use url::Url;

use crate::error::{Error, Result};
use crate::validation::MAX_IMAGE_SIZE_BYTES;

/// Upper bound for a single remote fetch
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for fetching user-supplied image URLs.
///
/// Target hosts are not restricted; SSRF exposure is a known gap of the
/// service and is the operator's responsibility to fence off.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: Client,
}

impl RemoteFetcher {
    /// Create a fetcher with the fixed download timeout.
    ///
    /// # Errors
    /// Fails when the underlying HTTP client cannot be constructed.
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch `url` into a bounded byte buffer.
    ///
    /// # Errors
    /// [`Error::Download`] for malformed URLs, network errors, non-success
    /// statuses, timeouts, empty bodies, and bodies over the size ceiling.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = Url::parse(url)
            .map_err(|_| Error::download("Invalid image URL."))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::download("Invalid image URL."));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "remote image request failed");
                Error::download("Unable to download image from URL.")
            })?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "remote host returned non-success");
            return Err(Error::download("Unable to download image from URL."));
        }

        // Reject early when the server already announces an oversized body.
        if let Some(length) = response.content_length() {
            if length as usize > MAX_IMAGE_SIZE_BYTES {
                return Err(Error::download("Image too large. Maximum size is 10MB."));
            }
        }

        let mut buffer: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.try_next().await.map_err(|e| {
            tracing::warn!(error = %e, "remote image body read failed");
            Error::download("Unable to download image from URL.")
        })? {
            if buffer.len() + chunk.len() > MAX_IMAGE_SIZE_BYTES {
                return Err(Error::download("Image too large. Maximum size is 10MB."));
            }
            buffer.extend_from_slice(&chunk);
        }

        if buffer.is_empty() {
            return Err(Error::download("Downloaded image is empty."));
        }

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_malformed_url_is_download_error() {
        let fetcher = RemoteFetcher::new().unwrap();
        let result = fetcher.fetch("not a url at all").await;
        assert!(matches!(result, Err(Error::Download(_))));
    }

    #[tokio::test]
    async fn test_non_http_scheme_rejected() {
        let fetcher = RemoteFetcher::new().unwrap();
        let result = fetcher.fetch("file:///etc/passwd").await;
        assert!(matches!(result, Err(Error::Download(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_download_error() {
        let fetcher = RemoteFetcher::new().unwrap();
        // Port 1 on loopback refuses connections immediately.
        let result = fetcher.fetch("http://127.0.0.1:1/image.jpg").await;
        assert!(matches!(result, Err(Error::Download(_))));
    }
}
