use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "~/.config/searchrank/config.yaml";
const DEFAULT_DATA_PATH: &str = "~/.local/share/searchrank";

/// Settings shared by the HTTP clients calling remote ranking backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendClientConfig {
    /// Per-request timeout in seconds. Every backend call is bounded by
    /// this; there are no retries.
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend_timeout_secs() -> u64 {
    10
}

impl Default for BackendClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_backend_timeout_secs(),
        }
    }
}

/// HTTP surface configuration.
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

/// Main process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory holding the configuration index database
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// HTTP surface
    #[serde(default)]
    pub server: ServerConfig,

    /// Ranking backend client settings
    #[serde(default)]
    pub backend: BackendClientConfig,
}

fn default_data_path() -> PathBuf {
    expand_path(DEFAULT_DATA_PATH)
}

impl Config {
    /// Load configuration from the default path or fall back to defaults.
    pub fn load() -> Result<Self, anyhow::Error> {
        let config_path = expand_path(DEFAULT_CONFIG_PATH);

        if config_path.exists() {
            info!("Loading configuration from: {:?}", config_path);
            let content = fs::read_to_string(&config_path)?;
            let mut config: Config = serde_yaml::from_str(&content)?;
            config.data_path = expand_path(&config.data_path.to_string_lossy());
            Ok(config)
        } else {
            info!("Configuration not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Path of the configuration index database.
    pub fn db_path(&self) -> PathBuf {
        self.data_path.join("configurations.db")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            server: ServerConfig::default(),
            backend: BackendClientConfig::default(),
        }
    }
}

fn expand_path(path: &str) -> PathBuf {
    shellexpand::tilde(path).parse().unwrap()
}
