//! Configuration Module
//!
//! Handles configuration loading from a YAML file, environment variables,
//! and command-line arguments.

use clap::{Arg, Command};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::{AggregatorError, Result};

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Object-store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Custom endpoint for S3-compatible stores (MinIO and friends);
    /// `None` uses the region's default endpoint.
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Permit plain-HTTP endpoints (local development stores).
    pub allow_http: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-east-1".to_string(),
            bucket: "datalake".to_string(),
            allow_http: false,
        }
    }
}

/// Aggregation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Key prefix the source objects live under.
    pub source_prefix: String,
    /// Key the published aggregate is written to.
    pub output_key: String,
    /// Default column set of exported aggregates.
    pub output_columns: Vec<String>,
    /// Field delimiter of source fragments and CSV exports; may be longer
    /// than one character.
    pub csv_delimiter: String,
    /// Cell value signifying "empty" in exports. Kept distinguishable
    /// from real keys and chosen so delimiters with trailing whitespace
    /// survive a round trip.
    pub empty_value: String,
    /// File extensions recognized as image assets.
    pub image_extensions: HashSet<String>,
    /// Maximum concurrent fragment downloads per pass.
    pub fetch_concurrency: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            source_prefix: "source_data".to_string(),
            output_key: "processed_data/output.csv".to_string(),
            output_columns: vec![
                "user_id".to_string(),
                "first_name".to_string(),
                "last_name".to_string(),
                "birthts".to_string(),
                "img_path".to_string(),
            ],
            csv_delimiter: ", ".to_string(),
            empty_value: "\u{f8}".to_string(),
            image_extensions: [".png".to_string()].into_iter().collect(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

/// One download worker per available processor.
fn default_fetch_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub aggregator: AggregatorConfig,
    pub logging: LogConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from an optional YAML file, then applies
    /// environment overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    AggregatorError::ConfigError(format!(
                        "Failed to read config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                serde_yaml::from_str(&contents).map_err(|e| {
                    AggregatorError::ConfigError(format!(
                        "Failed to parse config file {}: {}",
                        path.display(),
                        e
                    ))
                })?
            }
            None => Config::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses command-line arguments and loads the configuration they
    /// point at.
    pub fn from_args() -> Result<Self> {
        let matches = Command::new("userdata-aggregator")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Cached aggregation service for per-user records in an object store")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Path to a YAML configuration file"),
            )
            .arg(
                Arg::new("port")
                    .short('p')
                    .long("port")
                    .value_name("PORT")
                    .help("Override the HTTP listen port"),
            )
            .get_matches();

        let mut config = Self::load(matches.get_one::<String>("config").map(Path::new))?;
        if let Some(port) = matches.get_one::<String>("port") {
            config.server.port = port
                .parse()
                .map_err(|e| AggregatorError::ConfigError(format!("Invalid port: {}", e)))?;
        }
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("AGGREGATOR_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }
        if let Ok(port) = std::env::var("AGGREGATOR_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| AggregatorError::ConfigError(format!("Invalid AGGREGATOR_PORT: {}", e)))?;
        }
        if let Ok(endpoint) = std::env::var("AGGREGATOR_S3_ENDPOINT") {
            self.storage.endpoint = Some(endpoint);
        }
        if let Ok(bucket) = std::env::var("AGGREGATOR_S3_BUCKET") {
            self.storage.bucket = bucket;
        }
        if let Ok(level) = std::env::var("AGGREGATOR_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.aggregator.csv_delimiter.is_empty() {
            return Err(AggregatorError::ConfigError(
                "csv_delimiter must not be empty".to_string(),
            ));
        }
        if self.aggregator.output_columns.is_empty() {
            return Err(AggregatorError::ConfigError(
                "output_columns must not be empty".to_string(),
            ));
        }
        if self.storage.bucket.is_empty() {
            return Err(AggregatorError::ConfigError(
                "storage.bucket must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
