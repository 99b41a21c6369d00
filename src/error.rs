// Crate-wide error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid search configuration: {0}")]
    Configuration(String),

    #[error("Search configuration not found: {0}")]
    ConfigurationNotFound(String),

    #[error("Result transformer not installed: {0}")]
    TransformerUnavailable(String),

    #[error("Transformer failed: {0}")]
    Transformer(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Schema already exists")]
    SchemaExists,

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Backend request failed: {0}")]
    Backend(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
