//! # Configuration Module
//!
//! The configuration system uses a builder pattern to construct a `PifConfig`
//! holding the settings and injected capabilities of one run. Nothing here is
//! process-global: two configs with different directories can coexist.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::PifConfig;
//!
//! let config = PifConfig::builder()
//!     .config_dir("/home/me/.pif")
//!     .fetch_concurrency(8)
//!     .skip_refresh(true)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! [`PifConfigBuilder::build`] validates every setting and returns an
//! actionable [`Error::Config`].

use crate::error::{Error, Result};
use bridge_traits::HttpClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of the local file index store.
pub const FILE_INDEX_NAME: &str = "files.json";

/// File name of the remote metadata index store.
pub const PHOTO_INDEX_NAME: &str = "photos.json";

/// File name of the shorthash index store.
pub const HASH_INDEX_NAME: &str = "hashes.json";

const DEFAULT_FETCH_CONCURRENCY: usize = 4;
const MAX_FETCH_CONCURRENCY: usize = 32;
const DEFAULT_FETCH_ATTEMPTS: u32 = 3;

/// Configuration of one indexing run.
#[derive(Clone)]
pub struct PifConfig {
    /// Directory holding the three index stores
    pub config_dir: PathBuf,

    /// Number of concurrent remote tail fetches
    pub fetch_concurrency: usize,

    /// Number of passes over still-failing tail fetches before giving up
    pub fetch_attempts: u32,

    /// Skip the eager remote refresh when the coordinator is opened
    pub skip_refresh: bool,

    /// HTTP client used by providers (optional, injected by the host)
    pub http_client: Option<Arc<dyn HttpClient>>,
}

impl std::fmt::Debug for PifConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PifConfig")
            .field("config_dir", &self.config_dir)
            .field("fetch_concurrency", &self.fetch_concurrency)
            .field("fetch_attempts", &self.fetch_attempts)
            .field("skip_refresh", &self.skip_refresh)
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .finish()
    }
}

impl PifConfig {
    /// Creates a new builder for constructing a `PifConfig`.
    pub fn builder() -> PifConfigBuilder {
        PifConfigBuilder::default()
    }

    pub fn file_index_path(&self) -> PathBuf {
        self.config_dir.join(FILE_INDEX_NAME)
    }

    pub fn photo_index_path(&self) -> PathBuf {
        self.config_dir.join(PHOTO_INDEX_NAME)
    }

    pub fn hash_index_path(&self) -> PathBuf {
        self.config_dir.join(HASH_INDEX_NAME)
    }

    /// Returns the injected HTTP client or a `CapabilityMissing` error.
    pub fn require_http_client(&self) -> Result<Arc<dyn HttpClient>> {
        self.http_client
            .clone()
            .ok_or_else(|| Error::CapabilityMissing {
                capability: "HttpClient".to_string(),
                message: "No HTTP client implementation provided. \
                          Desktop: inject bridge_desktop::ReqwestHttpClient."
                    .to_string(),
            })
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.config_dir.as_os_str().is_empty() {
            return Err(Error::Config(
                "Configuration directory cannot be empty".to_string(),
            ));
        }

        if self.fetch_concurrency == 0 || self.fetch_concurrency > MAX_FETCH_CONCURRENCY {
            return Err(Error::Config(format!(
                "Fetch concurrency must be between 1 and {}, got {}",
                MAX_FETCH_CONCURRENCY, self.fetch_concurrency
            )));
        }

        if self.fetch_attempts == 0 {
            return Err(Error::Config(
                "Fetch attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Default configuration directory, `~/.pif`.
pub fn default_config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".pif"))
        .ok_or_else(|| {
            Error::Config(
                "Cannot determine the home directory; pass a configuration directory explicitly"
                    .to_string(),
            )
        })
}

/// Builder for constructing [`PifConfig`] instances.
#[derive(Default)]
pub struct PifConfigBuilder {
    config_dir: Option<PathBuf>,
    fetch_concurrency: Option<usize>,
    fetch_attempts: Option<u32>,
    skip_refresh: bool,
    http_client: Option<Arc<dyn HttpClient>>,
}

impl PifConfigBuilder {
    /// Sets the directory holding the index stores. Defaults to `~/.pif`.
    pub fn config_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the number of concurrent remote tail fetches (default 4).
    pub fn fetch_concurrency(mut self, workers: usize) -> Self {
        self.fetch_concurrency = Some(workers);
        self
    }

    /// Sets the number of fetch passes per refresh (default 3).
    pub fn fetch_attempts(mut self, attempts: u32) -> Self {
        self.fetch_attempts = Some(attempts);
        self
    }

    /// Suppress the eager refresh performed when the index is opened.
    pub fn skip_refresh(mut self, skip: bool) -> Self {
        self.skip_refresh = skip;
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the configuration, filling defaults and validating.
    pub fn build(self) -> Result<PifConfig> {
        let config_dir = match self.config_dir {
            Some(dir) => dir,
            None => default_config_dir()?,
        };

        let config = PifConfig {
            config_dir,
            fetch_concurrency: self.fetch_concurrency.unwrap_or(DEFAULT_FETCH_CONCURRENCY),
            fetch_attempts: self.fetch_attempts.unwrap_or(DEFAULT_FETCH_ATTEMPTS),
            skip_refresh: self.skip_refresh,
            http_client: self.http_client,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PifConfig::builder().config_dir("/tmp/pif").build().unwrap();

        assert_eq!(config.fetch_concurrency, 4);
        assert_eq!(config.fetch_attempts, 3);
        assert!(!config.skip_refresh);
        assert!(config.http_client.is_none());
    }

    #[test]
    fn test_store_paths() {
        let config = PifConfig::builder().config_dir("/tmp/pif").build().unwrap();

        assert_eq!(config.file_index_path(), PathBuf::from("/tmp/pif/files.json"));
        assert_eq!(config.photo_index_path(), PathBuf::from("/tmp/pif/photos.json"));
        assert_eq!(config.hash_index_path(), PathBuf::from("/tmp/pif/hashes.json"));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let result = PifConfig::builder()
            .config_dir("/tmp/pif")
            .fetch_concurrency(0)
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_excessive_concurrency() {
        let result = PifConfig::builder()
            .config_dir("/tmp/pif")
            .fetch_concurrency(MAX_FETCH_CONCURRENCY + 1)
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let result = PifConfig::builder()
            .config_dir("/tmp/pif")
            .fetch_attempts(0)
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_http_client() {
        let config = PifConfig::builder().config_dir("/tmp/pif").build().unwrap();

        match config.require_http_client() {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "HttpClient")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_debug_hides_capabilities() {
        let config = PifConfig::builder()
            .config_dir("/tmp/pif")
            .skip_refresh(true)
            .build()
            .unwrap();

        let rendered = format!("{:?}", config);
        assert!(rendered.contains("skip_refresh: true"));
        assert!(rendered.contains("http_client: None"));
    }
}
