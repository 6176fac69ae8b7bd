//! Process-wide configuration resolved once at startup
//!
//! The configuration is read from the environment in `main`, validated, and
//! then shared read-only by every request through the application state.
//! Nothing reads ambient environment variables mid-request.

use std::fmt;

use anyhow::{bail, Context};

/// Immutable service configuration
#[derive(Clone)]
pub struct Config {
    /// Shared secret checked against the `X-API-Key` header
    pub api_key: String,
    /// Object storage bucket name
    pub bucket: String,
    /// S3-compatible endpoint URL
    pub endpoint: String,
    /// Storage access key id
    pub access_key_id: String,
    /// Storage secret access key
    pub secret_access_key: String,
    /// Storage region label
    pub region: String,
    /// Permanent public URL prefix; when set, presigning is skipped
    pub public_base_url: Option<String>,
    /// HTTP listen address
    pub bind_addr: String,
    /// Permits gating concurrent background removal work
    pub max_concurrent_removals: usize,
}

impl Config {
    /// Resolve the configuration from process environment variables.
    ///
    /// # Errors
    /// Fails when a required variable is missing or empty.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |name: &str| -> anyhow::Result<String> {
            match get(name) {
                Some(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
                _ => bail!("required environment variable {name} is not set"),
            }
        };

        let max_concurrent_removals = match get("MAX_CONCURRENT_REMOVALS") {
            Some(raw) => {
                let permits: usize = raw
                    .trim()
                    .parse()
                    .context("MAX_CONCURRENT_REMOVALS must be a positive integer")?;
                if permits == 0 {
                    bail!("MAX_CONCURRENT_REMOVALS must be a positive integer");
                }
                permits
            },
            None => std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4),
        };

        Ok(Self {
            api_key: required("API_KEY")?,
            bucket: required("BUCKET")?,
            endpoint: required("ENDPOINT")?,
            access_key_id: required("ACCESS_KEY_ID")?,
            secret_access_key: required("SECRET_ACCESS_KEY")?,
            region: get("REGION")
                .filter(|r| !r.trim().is_empty())
                .map_or_else(|| "us-east-1".to_owned(), |r| r.trim().to_owned()),
            public_base_url: get("PUBLIC_BASE_URL")
                .map(|u| u.trim().trim_end_matches('/').to_owned())
                .filter(|u| !u.is_empty()),
            bind_addr: get("BIND_ADDR")
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| "0.0.0.0:8080".to_owned()),
            max_concurrent_removals,
        })
    }
}

// Manual Debug so credentials never leak into logs or error output.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("public_base_url", &self.public_base_url)
            .field("bind_addr", &self.bind_addr)
            .field("max_concurrent_removals", &self.max_concurrent_removals)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("API_KEY", "secret"),
            ("BUCKET", "images"),
            ("ENDPOINT", "https://storage.example.com"),
            ("ACCESS_KEY_ID", "AKIATEST"),
            ("SECRET_ACCESS_KEY", "sk-test"),
        ])
    }

    fn config_from(vars: &HashMap<&str, &str>) -> anyhow::Result<Config> {
        Config::from_lookup(|name| vars.get(name).map(|v| (*v).to_owned()))
    }

    #[test]
    fn test_minimal_config_with_defaults() {
        let config = config_from(&base_vars()).unwrap();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(config.public_base_url.is_none());
        assert!(config.max_concurrent_removals >= 1);
    }

    #[test]
    fn test_missing_required_variable_fails() {
        let mut vars = base_vars();
        vars.remove("BUCKET");
        assert!(config_from(&vars).is_err());
    }

    #[test]
    fn test_empty_required_variable_fails() {
        let mut vars = base_vars();
        vars.insert("API_KEY", "  ");
        assert!(config_from(&vars).is_err());
    }

    #[test]
    fn test_public_base_url_trailing_slash_trimmed() {
        let mut vars = base_vars();
        vars.insert("PUBLIC_BASE_URL", "https://cdn.example.com/");
        let config = config_from(&vars).unwrap();
        assert_eq!(
            config.public_base_url.as_deref(),
            Some("https://cdn.example.com")
        );
    }

    #[test]
    fn test_zero_removal_permits_rejected() {
        let mut vars = base_vars();
        vars.insert("MAX_CONCURRENT_REMOVALS", "0");
        assert!(config_from(&vars).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", config_from(&base_vars()).unwrap());
        assert!(!rendered.contains("sk-test"));
        assert!(!rendered.contains("\"secret\""));
        assert!(rendered.contains("<redacted>"));
    }
}
