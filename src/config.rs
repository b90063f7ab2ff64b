//! Tourplan configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main tourplan configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Planning assistant configuration
    pub assistant: AssistantConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Target distribution configuration
    pub targets: TargetsConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required environment variables are set so startup
    /// fails fast with a clear message.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.assistant.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "Assistant API key not found. Set the {} environment variable.",
                self.assistant.api_key_env
            ));
        }
        if self.assistant.assistant_id.trim().is_empty() {
            return Err(eyre::eyre!(
                "assistant-id is not set. Add it to the config file under assistant:"
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .tourplan.yml
        let local_config = PathBuf::from(".tourplan.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/tourplan/tourplan.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tourplan").join("tourplan.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Planning assistant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Provider name (currently only "openai" supported)
    pub provider: String,

    /// Pre-configured assistant identifier at the provider
    #[serde(rename = "assistant-id")]
    pub assistant_id: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Per-request HTTP timeout in milliseconds
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Interval between run status polls in milliseconds
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Overall deadline for one assistant run in milliseconds
    #[serde(rename = "run-timeout-ms")]
    pub run_timeout_ms: u64,
}

impl AssistantConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).map_err(|_| {
            eyre::eyre!(
                "API key not found. Set the {} environment variable.",
                self.api_key_env
            )
        })
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            assistant_id: String::new(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            request_timeout_ms: 30_000,
            poll_interval_ms: 2_000,
            run_timeout_ms: 120_000,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub bind: String,

    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path
    #[serde(rename = "db-path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/tourplan on Linux)
        let db_path = dirs::data_dir()
            .map(|d| d.join("tourplan"))
            .unwrap_or_else(|| PathBuf::from(".tourplan"))
            .join("tourplan.db");

        Self { db_path }
    }
}

/// Target distribution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    /// Working days per target week (Monday through Saturday)
    #[serde(rename = "working-days")]
    pub working_days: u32,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self { working_days: 6 }
    }
}
