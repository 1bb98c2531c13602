//! Configuration settings structures
//!
//! Every section carries `#[serde(default)]`, so a configuration file only
//! needs the keys it wants to change.

use crate::config::Args;
use crate::error::ServerError;
use crate::lifecycle::LifecycleConfig;
use game_protocol::DEFAULT_MAX_FRAME_SIZE;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Port the host listens on when nothing else is configured.
pub const DEFAULT_PORT: u16 = 1935;

/// Longest delta a single tick charges to the session clock.
pub const DEFAULT_MAX_TICK_DELTA_MS: u64 = 333;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration object, read from and written to TOML.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub metrics: MetricsSettings,
    pub logging: LoggingSettings,
}

/// Network and game loop settings.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// Interface to bind; `0.0.0.0` accepts connections on every interface.
    pub bind_ip: IpAddr,

    /// Port clients connect to. Also reported to the platform.
    pub port: u16,

    /// Tick interval in milliseconds
    pub tick_rate_ms: u64,

    /// Largest frame payload accepted from or sent to a client, in bytes.
    pub max_frame_size: u32,

    /// Upper bound on the time one tick may charge to the session timers,
    /// in milliseconds. A stalled runtime advances the timers by at most this.
    pub max_tick_delta_ms: u64,
}

/// Session timeouts, in seconds.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    /// How long an activated session may wait for its first player.
    pub wait_for_players_secs: f64,

    /// Longest a running game may last.
    pub max_session_secs: f64,
}

/// StatsD metrics output.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub statsd_addr: SocketAddr,
}

/// Logging system configuration
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Logging level filter
    ///
    /// Valid values: "trace", "debug", "info", "warn", "error".
    /// `RUST_LOG` takes precedence when set.
    pub level: String,

    /// Enable JSON-formatted console output
    pub json_format: bool,

    /// Log file handed to the platform for collection.
    ///
    /// Defaults to `logs/game_host{port}.log` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            tick_rate_ms: 16,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_tick_delta_ms: DEFAULT_MAX_TICK_DELTA_MS,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        let defaults = LifecycleConfig::default();
        Self {
            wait_for_players_secs: defaults.wait_for_players.as_secs_f64(),
            max_session_secs: defaults.max_session.as_secs_f64(),
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            statsd_addr: SocketAddr::from(([127, 0, 0, 1], 8125)),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            file_path: None,
        }
    }
}

impl Config {
    /// Overlay command-line flags onto the file values.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if args.debug {
            self.logging.level = "debug".to_string();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
        if let Some(path) = &args.log_file {
            self.logging.file_path = Some(path.clone());
        }
    }

    /// Reject settings the host cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.server.tick_rate_ms == 0 {
            return Err(ServerError::Config("server.tick_rate_ms must be positive".into()));
        }
        if self.server.max_frame_size == 0 {
            return Err(ServerError::Config("server.max_frame_size must be positive".into()));
        }
        if self.server.max_tick_delta_ms < self.server.tick_rate_ms {
            return Err(ServerError::Config(format!(
                "server.max_tick_delta_ms ({}) must be at least server.tick_rate_ms ({})",
                self.server.max_tick_delta_ms, self.server.tick_rate_ms
            )));
        }
        self.lifecycle_config()?;

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ServerError::Config(format!(
                "logging.level must be one of {:?}, got {:?}",
                LOG_LEVELS, self.logging.level
            )));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.bind_ip, self.server.port)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.server.tick_rate_ms)
    }

    /// Cap applied to each measured tick delta.
    pub fn max_tick_delta(&self) -> Duration {
        Duration::from_millis(self.server.max_tick_delta_ms)
    }

    /// Session thresholds as durations.
    pub fn lifecycle_config(&self) -> Result<LifecycleConfig, ServerError> {
        Ok(LifecycleConfig {
            wait_for_players: positive_secs(
                "session.wait_for_players_secs",
                self.session.wait_for_players_secs,
            )?,
            max_session: positive_secs("session.max_session_secs", self.session.max_session_secs)?,
        })
    }

    /// The log file path, falling back to one derived from the port.
    pub fn log_file_path(&self) -> PathBuf {
        self.logging
            .file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("logs/game_host{}.log", self.server.port)))
    }
}

fn positive_secs(key: &str, secs: f64) -> Result<Duration, ServerError> {
    if secs.is_nan() || secs <= 0.0 {
        return Err(ServerError::Config(format!("{key} must be positive, got {secs}")));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ServerError::Config(format!("{key} is out of range: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_hosting_contract() {
        let config = Config::default();
        assert_eq!(config.server.port, 1935);
        assert_eq!(config.lifecycle_config().unwrap(), LifecycleConfig::default());
        assert_eq!(config.log_file_path(), PathBuf::from("logs/game_host1935.log"));
        assert_eq!(config.max_tick_delta(), Duration::from_millis(333));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_config_survives_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
[session]
wait_for_players_secs = 30.0
"#,
        )
        .unwrap();
        assert_eq!(config.session.wait_for_players_secs, 30.0);
        assert_eq!(config.session.max_session_secs, 1200.0);
        assert_eq!(config.server, ServerSettings::default());
    }

    #[test]
    fn args_override_file_values() {
        let mut config = Config::default();
        let args = Args {
            port: Some(7777),
            debug: true,
            json_logs: true,
            ..Default::default()
        };
        config.apply_args(&args);

        assert_eq!(config.listen_addr().port(), 7777);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert_eq!(config.log_file_path(), PathBuf::from("logs/game_host7777.log"));
    }

    #[test]
    fn rejects_unusable_settings() {
        let mut config = Config::default();
        config.session.max_session_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.session.wait_for_players_secs = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.tick_rate_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.max_frame_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.max_tick_delta_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.level = "verbose".into();
        assert!(config.validate().is_err());
    }
}
