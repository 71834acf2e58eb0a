//! Importer configuration.
//!
//! Loaded from an optional YAML file (`config/importer.yaml` by default).
//! A missing file is not an error: the built-in defaults describe the
//! public Met Office dataset and the catalog of series it publishes.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fetch::FetchConfig;

pub const DEFAULT_BASE_URL: &str =
    "https://www.metoffice.gov.uk/pub/data/weather/uk/climate/datasets/";

pub const DEFAULT_PARAMETERS: [&str; 5] = ["Tmax", "Tmin", "Tmean", "Rainfall", "Sunshine"];

pub const DEFAULT_REGIONS: [&str; 17] = [
    "UK",
    "England",
    "Wales",
    "Scotland",
    "Northern_Ireland",
    "England_and_Wales",
    "England_N",
    "England_S",
    "Scotland_N",
    "Scotland_E",
    "Scotland_W",
    "England_E_and_NE",
    "England_NW_and_N_Wales",
    "Midlands",
    "East_Anglia",
    "England_SW_and_S_Wales",
    "England_SE_and_Central_S",
];

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    pub source: SourceConfig,
    /// Parameter codes imported by a full batch run
    pub parameters: Vec<String>,
    /// Region codes imported by a full batch run
    pub regions: Vec<String>,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            parameters: DEFAULT_PARAMETERS.iter().map(|s| s.to_string()).collect(),
            regions: DEFAULT_REGIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Upstream source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    /// Total attempts per file, including the first
    pub max_retries: u32,
    /// Base backoff delay; doubles after each failed attempt
    pub retry_delay_secs: f64,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// A 404 whose body is longer than this is treated as content
    pub min_fallback_bytes: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 3,
            retry_delay_secs: 1.0,
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            min_fallback_bytes: 100,
        }
    }
}

impl SourceConfig {
    /// Fetcher settings. Fails when `retry_delay_secs` is not a representable duration.
    pub fn fetch_config(&self) -> Result<FetchConfig> {
        let retry_delay = Duration::try_from_secs_f64(self.retry_delay_secs.max(0.0))
            .with_context(|| format!("Invalid retry_delay_secs: {}", self.retry_delay_secs))?;

        Ok(FetchConfig {
            base_url: self.base_url.clone(),
            max_retries: self.max_retries,
            retry_delay,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            min_fallback_bytes: self.min_fallback_bytes,
        })
    }
}

impl ImporterConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ImporterConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(
            path = %path.display(),
            parameters = config.parameters.len(),
            regions = config.regions.len(),
            "Loaded importer config"
        );
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent.
    ///
    /// A file that exists but cannot be parsed is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ImporterConfig::default();
        assert_eq!(config.parameters.len(), 5);
        assert_eq!(config.regions.len(), 17);
        assert_eq!(config.source.min_fallback_bytes, 100);
        assert!(config.source.base_url.ends_with("/datasets/"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
source:
  base_url: "http://localhost:9000/"
  max_retries: 5
  retry_delay_secs: 2
parameters: [Tmax, Rainfall]
"#;
        let config: ImporterConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.source.base_url, "http://localhost:9000/");
        assert_eq!(config.source.max_retries, 5);
        assert_eq!(config.source.min_fallback_bytes, 100);
        assert_eq!(config.parameters, vec!["Tmax", "Rainfall"]);
        assert_eq!(config.regions.len(), 17);

        let fetch = config.source.fetch_config().unwrap();
        assert_eq!(fetch.retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_unrepresentable_retry_delay_is_error() {
        let config: ImporterConfig = serde_yaml::from_str("source:\n  retry_delay_secs: .inf\n").unwrap();
        let err = config.source.fetch_config().unwrap_err();
        assert!(err.to_string().contains("retry_delay_secs"));

        let source = SourceConfig {
            retry_delay_secs: 1e30,
            ..Default::default()
        };
        assert!(source.fetch_config().is_err());

        let source = SourceConfig {
            retry_delay_secs: -5.0,
            ..Default::default()
        };
        assert_eq!(source.fetch_config().unwrap().retry_delay, Duration::ZERO);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "regions: [UK, Wales]").unwrap();

        let config = ImporterConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.regions, vec!["UK", "Wales"]);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ImporterConfig::load_or_default(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, ImporterConfig::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "source: [not, a, map]").unwrap();

        assert!(ImporterConfig::load_or_default(file.path()).is_err());
    }
}
