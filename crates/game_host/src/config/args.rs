//! Command-line argument parsing

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the game host
///
/// Flags that are given override the matching configuration file values.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    ///
    /// If the file doesn't exist, a default configuration will be created.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Port to accept client connections on [default from config: 1935]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log file reported to the platform [default: logs/game_host{port}.log]
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Emit JSON-formatted logs on the console
    #[arg(long)]
    pub json_logs: bool,

    /// Run without the platform agent and activate this session id locally
    #[arg(long, value_name = "ID")]
    pub local_session: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config.toml"),
            port: None,
            log_file: None,
            debug: false,
            json_logs: false,
            local_session: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default() {
        let args = Args::default();
        assert_eq!(args.config, PathBuf::from("config.toml"));
        assert!(!args.debug);
        assert!(args.port.is_none());
        assert!(args.local_session.is_none());
    }

    #[test]
    fn parses_overrides() {
        let args = Args::try_parse_from([
            "game_host",
            "-p",
            "7777",
            "--log-file",
            "/tmp/host.log",
            "--local-session",
            "arn:local:gamesession/fleet-1/gsess-1",
            "-d",
        ])
        .unwrap();
        assert_eq!(args.port, Some(7777));
        assert_eq!(args.log_file, Some(PathBuf::from("/tmp/host.log")));
        assert_eq!(
            args.local_session.as_deref(),
            Some("arn:local:gamesession/fleet-1/gsess-1")
        );
        assert!(args.debug);
        assert!(!args.json_logs);
    }
}
