//! Configuration for the NBA prediction API.

use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: String,
    /// Feature contract of the exported pipeline; built-in defaults when unset
    #[serde(default = "default_metadata_path")]
    pub metadata_path: Option<String>,
}

fn default_model_path() -> String {
    "models/model_pipeline.onnx".to_string()
}

fn default_metadata_path() -> Option<String> {
    Some("models/metadata.json".to_string())
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            metadata_path: default_metadata_path(),
        }
    }
}

/// Team stats data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_teams_path")]
    pub teams_path: String,
    /// Single-character CSV field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_teams_path() -> String {
    "data/prediction/teams_advanced_2024_25.csv".to_string()
}

fn default_delimiter() -> String {
    ";".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            teams_path: default_teams_path(),
            delimiter: default_delimiter(),
        }
    }
}

impl DataConfig {
    /// Delimiter as a single byte.
    pub fn delimiter_byte(&self) -> anyhow::Result<u8> {
        match self.delimiter.as_bytes() {
            [b] => Ok(*b),
            _ => anyhow::bail!(
                "CSV delimiter must be a single byte, got {:?}",
                self.delimiter
            ),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub data: DataConfig,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables (NBA_SERVER__PORT, etc.)
            .add_source(
                config::Environment::with_prefix("NBA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Apply `serve` flags on top of the loaded server settings.
    pub fn override_server(&mut self, host: Option<String>, port: Option<u16>) {
        if let Some(h) = host {
            self.server.host = h;
        }
        if let Some(p) = port {
            self.server.port = p;
        }
    }
}
