//! TOML configuration file support for power users.
//!
//! Instead of passing many CLI flags, users can specify settings in a config
//! file:
//!
//! ```toml
//! # mzsparse.toml
//! [service]
//! url = "http://localhost:8000"
//! collection = "ms_spectra"
//! timeout_secs = 120
//!
//! [ingest]
//! bin_width = 0.1
//! batch_size = 256
//! max_attempts = 3
//! retry_base_ms = 500
//! ```
//!
//! Command-line flags always win over config-file values.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Root configuration structure for mzsparse.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Indexing-service connection settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Ingestion settings.
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Connection settings for the indexing service.
#[derive(Debug, Default, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the indexing service.
    pub url: Option<String>,

    /// Target collection name.
    pub collection: Option<String>,

    /// Per-call timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// Settings for the ingestion pipeline.
#[derive(Debug, Default, Deserialize)]
pub struct IngestConfig {
    /// m/z bin width.
    pub bin_width: Option<f64>,

    /// Number of spectra per upsert batch.
    pub batch_size: Option<usize>,

    /// Submission attempts per batch, including the first.
    pub max_attempts: Option<u32>,

    /// Retry backoff base in milliseconds.
    pub retry_base_ms: Option<u64>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [service]
            url = "http://qdrant-gateway:8000"
            collection = "gcms_library"
            timeout_secs = 30

            [ingest]
            bin_width = 0.05
            batch_size = 512
            max_attempts = 5
            retry_base_ms = 250
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(
            config.service.url.as_deref(),
            Some("http://qdrant-gateway:8000")
        );
        assert_eq!(config.service.collection.as_deref(), Some("gcms_library"));
        assert_eq!(config.service.timeout_secs, Some(30));
        assert_eq!(config.ingest.bin_width, Some(0.05));
        assert_eq!(config.ingest.batch_size, Some(512));
        assert_eq!(config.ingest.max_attempts, Some(5));
        assert_eq!(config.ingest.retry_base_ms, Some(250));
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [ingest]
            bin_width = 1.0
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.ingest.bin_width, Some(1.0));
        assert_eq!(config.ingest.batch_size, None);
        assert_eq!(config.service.url, None);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.service.url, None);
        assert_eq!(config.ingest.bin_width, None);
    }
}
