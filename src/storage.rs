//! Object storage boundary
//!
//! Uploads PNG cutouts under a collision-resistant key and resolves a
//! retrievable URL: a join against the configured public base URL when one is
//! set, otherwise a presigned GET valid for seven days. Failures map to
//! [`Error::Storage`]; error messages never carry credentials.

use async_trait::async_trait;
use s3::{creds::Credentials, Bucket, Region};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};

/// Fixed prefix for stored cutouts, placed at the bucket root
pub const OBJECT_KEY_PREFIX: &str = "bg-removed-";

/// Presigned URL lifetime: 7 days
pub const PRESIGNED_EXPIRY_SECS: u32 = 7 * 24 * 3600;

/// How the resolved URL grants access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// Permanently valid URL under the configured public base
    Public,
    /// Time-limited credential-embedding URL
    Presigned,
}

/// Result of a completed upload
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub kind: UrlKind,
    /// Seconds until the URL expires; `None` for public URLs
    pub expiry_secs: Option<u32>,
}

/// Boundary contract with the object storage backend
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload PNG bytes under a fresh unique key and resolve its URL.
    ///
    /// Two uploads of identical bytes must produce two distinct keys.
    ///
    /// # Errors
    /// Any upload or URL-resolution failure surfaces as [`Error::Storage`];
    /// it is never retried.
    async fn store_png(&self, bytes: Vec<u8>) -> Result<StoredObject>;
}

/// Generate a fresh object key: fixed prefix, opaque token, `.png` suffix
pub fn object_key() -> String {
    format!("{OBJECT_KEY_PREFIX}{}.png", Uuid::new_v4().simple())
}

/// S3-compatible storage client
pub struct S3Storage {
    bucket: Box<Bucket>,
    public_base_url: Option<String>,
}

impl S3Storage {
    /// Build a client for the configured bucket and endpoint.
    ///
    /// # Errors
    /// Fails when the credentials or bucket handle cannot be constructed.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_owned(),
        };
        let credentials = Credentials::new(
            Some(&config.access_key_id),
            Some(&config.secret_access_key),
            None,
            None,
            None,
        )?;
        let bucket = Bucket::new(&config.bucket, region, credentials)?.with_path_style();

        Ok(Self {
            bucket,
            public_base_url: config.public_base_url.clone(),
        })
    }

    async fn resolve_url(&self, key: &str) -> Result<(String, UrlKind, Option<u32>)> {
        if let Some(base) = &self.public_base_url {
            return Ok((format!("{base}/{key}"), UrlKind::Public, None));
        }

        let url = self
            .bucket
            .presign_get(key, PRESIGNED_EXPIRY_SECS, None)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key, "failed to presign object URL");
                Error::storage("Storage error: could not resolve object URL.")
            })?;
        Ok((url, UrlKind::Presigned, Some(PRESIGNED_EXPIRY_SECS)))
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    #[tracing::instrument(skip_all, fields(bytes = bytes.len()))]
    async fn store_png(&self, bytes: Vec<u8>) -> Result<StoredObject> {
        let key = object_key();

        let response = self
            .bucket
            .put_object_with_content_type(&key, &bytes, "image/png")
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key, "object upload failed");
                Error::storage("Storage upload error.")
            })?;

        if !(200..300).contains(&response.status_code()) {
            tracing::error!(status = response.status_code(), key, "object upload rejected");
            return Err(Error::storage("Storage upload error."));
        }

        let (url, kind, expiry_secs) = self.resolve_url(&key).await?;
        tracing::info!(key, ?kind, "stored cutout");
        Ok(StoredObject {
            key,
            url,
            kind,
            expiry_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_config(public_base_url: Option<&str>) -> Config {
        Config {
            api_key: "k".to_owned(),
            bucket: "images".to_owned(),
            endpoint: "https://storage.example.com".to_owned(),
            access_key_id: "AKIATEST".to_owned(),
            secret_access_key: "sk-test".to_owned(),
            region: "us-east-1".to_owned(),
            public_base_url: public_base_url.map(str::to_owned),
            bind_addr: "127.0.0.1:0".to_owned(),
            max_concurrent_removals: 1,
        }
    }

    #[test]
    fn test_object_key_shape() {
        let key = object_key();
        assert!(key.starts_with(OBJECT_KEY_PREFIX));
        assert!(key.ends_with(".png"));
        let token = &key[OBJECT_KEY_PREFIX.len()..key.len() - 4];
        assert_eq!(token.len(), 32);
    }

    #[test]
    fn test_object_keys_never_collide() {
        let keys: std::collections::HashSet<_> = (0..1000).map(|_| object_key()).collect();
        assert_eq!(keys.len(), 1000);
    }

    #[tokio::test]
    async fn test_public_base_url_short_circuits_presigning() {
        let storage = S3Storage::new(&test_config(Some("https://cdn.example.com"))).unwrap();
        let (url, kind, expiry) = storage.resolve_url("bg-removed-abc.png").await.unwrap();
        assert_eq!(url, "https://cdn.example.com/bg-removed-abc.png");
        assert_eq!(kind, UrlKind::Public);
        assert_eq!(expiry, None);
    }

    #[tokio::test]
    async fn test_presigned_url_carries_key_and_expiry() {
        // Presigning is a local signature computation; no network involved.
        let storage = S3Storage::new(&test_config(None)).unwrap();
        let (url, kind, expiry) = storage.resolve_url("bg-removed-abc.png").await.unwrap();
        assert_eq!(kind, UrlKind::Presigned);
        assert_eq!(expiry, Some(PRESIGNED_EXPIRY_SECS));
        assert!(url.contains("bg-removed-abc.png"));
        assert!(url.contains(&format!("X-Amz-Expires={PRESIGNED_EXPIRY_SECS}")));
        assert!(!url.contains("sk-test"));
    }
}
