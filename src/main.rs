use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use searchrank::cli::{Cli, Commands};
use searchrank::config::Config;

fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    info!("Configuration loaded successfully");
    info!("Data directory: {:?}", config.data_path);

    // Parse CLI arguments
    let cli = Cli::parse();

    // Dispatch commands
    match &cli.command {
        Commands::Serve { port } => {
            searchrank::server::init_logging();
            searchrank::cli::handle_serve(&config, *port)?;
        }
        Commands::Config(cmd) => {
            searchrank::cli::handle_config(cmd, &config)?;
        }
    }

    Ok(())
}
