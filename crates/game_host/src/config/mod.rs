//! Configuration module for the game host
//!
//! Command-line arguments, TOML configuration file parsing and the default
//! settings the host runs with.

pub mod args;
pub mod settings;

pub use args::Args;
pub use settings::{Config, LoggingSettings, MetricsSettings, ServerSettings, SessionSettings, DEFAULT_PORT};

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Load configuration from file or create default configuration
///
/// If the file doesn't exist, a default configuration file is written in its
/// place. Command-line overrides from `args` are applied afterwards and the
/// merged result is validated.
///
/// # Arguments
/// * `args` - Command line arguments containing the config file path and overrides
///
/// # Errors
/// * File I/O fails
/// * TOML parsing fails
/// * The merged configuration is not usable
pub async fn load_config(args: &Args) -> Result<Config> {
    let mut config = if args.config.exists() {
        let config_str = tokio::fs::read_to_string(&args.config)
            .await
            .with_context(|| format!("Failed to read config file {}", args.config.display()))?;
        toml::from_str::<Config>(&config_str)
            .with_context(|| format!("Failed to parse config file {}", args.config.display()))?
    } else {
        warn!("Configuration file not found: {}, using defaults", args.config.display());

        let default_config = Config::default();
        let config_str = toml::to_string_pretty(&default_config)?;
        tokio::fs::write(&args.config, config_str)
            .await
            .with_context(|| format!("Failed to write default config {}", args.config.display()))?;
        info!("Created default configuration file: {}", args.config.display());

        default_config
    };

    config.apply_args(args);
    config.validate()?;
    Ok(config)
}
