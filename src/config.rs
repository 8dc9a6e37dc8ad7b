//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.landhacker.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".landhacker.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Backend API settings.
    #[serde(default)]
    pub api: ApiSettings,

    /// Estimation settings.
    #[serde(default)]
    pub estimate: EstimateConfig,

    /// Local store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "landhacker_report.md".to_string()
}

/// Backend API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Backend base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Bearer token for authenticated routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            token: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Estimation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateConfig {
    /// Acreage bracket for the comparables lookup when the parcel area is unknown.
    #[serde(default = "default_lookup_acres")]
    pub default_lookup_acres: f64,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            default_lookup_acres: default_lookup_acres(),
        }
    }
}

fn default_lookup_acres() -> f64 {
    10.0
}

/// Local store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding profiles and saved queries.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Balance required before an estimate is run.
    #[serde(default = "default_min_credits")]
    pub min_credits: u64,

    /// Credits charged per saved estimate.
    #[serde(default = "default_credits_per_query")]
    pub credits_per_query: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            min_credits: default_min_credits(),
            credits_per_query: default_credits_per_query(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".landhacker")
}

fn default_min_credits() -> u64 {
    50
}

fn default_credits_per_query() -> u64 {
    50
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the comparables table in Markdown reports.
    #[serde(default = "default_true")]
    pub include_comparables: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_comparables: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only explicitly provided values override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(ref token) = args.api_token {
            self.api.token = Some(token.clone());
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(ref data_dir) = args.data_dir {
            self.store.data_dir = data_dir.clone();
        }
        if args.no_comparables {
            self.report.include_comparables = false;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level for this run. `--quiet` wins over a verbose config.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.estimate.default_lookup_acres, 10.0);
        assert_eq!(config.store.min_credits, 50);
        assert!(config.report.include_comparables);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.md"
verbose = true

[api]
base_url = "https://api.example.com"
token = "secret"

[store]
min_credits = 10
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.md");
        assert!(config.general.verbose);
        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.api.token.as_deref(), Some("secret"));
        assert_eq!(config.api.timeout_seconds, 30);
        assert_eq!(config.store.min_credits, 10);
        assert_eq!(config.store.credits_per_query, 50);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[store]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.store.data_dir, PathBuf::from(".landhacker"));
    }

    #[test]
    fn test_log_level_from_config() {
        let mut config = Config::default();
        assert_eq!(config.log_level(false), tracing::Level::INFO);

        config.general.verbose = true;
        assert_eq!(config.log_level(false), tracing::Level::DEBUG);
        assert_eq!(config.log_level(true), tracing::Level::ERROR);

        let from_file: Config = toml::from_str("[general]\nverbose = true\n").unwrap();
        assert_eq!(from_file.log_level(false), tracing::Level::DEBUG);
    }
}
