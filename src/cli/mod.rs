// Command-line interface

use crate::config::Config;
use crate::configuration::SearchConfiguration;
use crate::store::{ConfigurationStore, SqliteIndex, SEARCH_CONFIGURATIONS_INDEX};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "searchrank", version, about = "Pluggable post-retrieval result re-ranking")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Manage stored search configurations
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Store a search configuration from a JSON file (or stdin)
    Put {
        /// Configuration name
        name: String,
        /// JSON file with the configuration body; stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print a stored search configuration
    Get {
        /// Configuration name
        name: String,
    },
}

fn open_store(config: &Config) -> Result<ConfigurationStore> {
    let registry = Arc::new(crate::builtin_registry()?);
    let index = Arc::new(SqliteIndex::open(
        config.db_path(),
        SEARCH_CONFIGURATIONS_INDEX,
    )?);
    Ok(ConfigurationStore::new(index, registry))
}

pub fn handle_serve(config: &Config, port: Option<u16>) -> Result<()> {
    let mut config = config.clone();
    if let Some(port) = port {
        config.server.port = port;
    }
    crate::server::run_server(&config)
}

pub fn handle_config(cmd: &ConfigCommands, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let rt = tokio::runtime::Runtime::new()?;

    match cmd {
        ConfigCommands::Put { name, file } => {
            let body = match file {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let body: serde_json::Value =
                serde_json::from_str(&body).context("Configuration body is not valid JSON")?;
            let parsed = SearchConfiguration::parse(&body, store.registry())?;
            let acknowledged = rt.block_on(store.put_async(name, &parsed))?;
            println!("{}: acknowledged={}", name, acknowledged);
        }
        ConfigCommands::Get { name } => {
            // Blocking lookup with the process-wide bound; this path has no
            // continuation to hand the result to.
            let config = store.get_sync(rt.handle(), name, crate::OPERATION_TIMEOUT)?;
            match config {
                Some(config) => println!("{}", serde_json::to_string_pretty(&config.to_json())?),
                None => anyhow::bail!("search configuration not found: {}", name),
            }
        }
    }
    Ok(())
}
