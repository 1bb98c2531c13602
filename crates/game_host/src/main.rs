//! Game host entry point.
//!
//! Loads configuration, sets up logging and metrics, and runs the host until
//! its session ends or the process is signalled.

use anyhow::{Context, Result};
use clap::Parser;
use game_host::{
    config::{self, Args},
    logging, shutdown, GameHost, GameSessionInfo, LocalPlatform, MetricsSink, NoopMetrics,
    StatsdClient,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = Instant::now();
    let args = Args::parse();

    let config = {
        let _bootstrap = logging::bootstrap_logging(args.debug);
        config::load_config(&args)
            .await
            .context("Failed to load config")?
    };

    let log_path = config.log_file_path();
    let _log_guard = logging::setup_logging(&config.logging, Some(&log_path))
        .context("Failed to initialize logging")?;

    info!("🎮 Starting game host");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", args.config.display());
    log_configuration(&config);

    let metrics: Arc<dyn MetricsSink> = if config.metrics.enabled {
        match StatsdClient::new(config.metrics.statsd_addr) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                warn!("Metrics disabled, cannot open StatsD socket: {}", e);
                Arc::new(NoopMetrics)
            }
        }
    } else {
        Arc::new(NoopMetrics)
    };

    let listener = TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr()))?;

    let platform = Arc::new(LocalPlatform::new());
    let host = GameHost::new(config, platform.clone(), metrics)?;

    if let Some(session_id) = args.local_session.clone() {
        tokio::spawn(activate_when_ready(platform, session_id));
    } else {
        info!("No --local-session given; the host will idle until a session is activated");
    }

    let shutdown_receiver = shutdown::setup_shutdown_handler();
    info!("Startup complete in {:.2?}", startup_start.elapsed());

    host.run(listener, async move {
        let _ = shutdown_receiver.await;
    })
    .await?;

    Ok(())
}

/// Simulate the platform assigning a session once the host is ready.
async fn activate_when_ready(platform: Arc<LocalPlatform>, session_id: String) {
    while platform.ready_port().is_none() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let session = GameSessionInfo {
        game_session_id: session_id,
        name: Some("local".to_string()),
        maximum_player_session_count: 10,
        matchmaker_data: None,
    };
    if let Err(e) = platform.activate_session_locally(session) {
        warn!("Local session activation failed: {}", e);
    }
}

fn log_configuration(config: &config::Config) {
    info!("Host configuration:");
    info!("  Listen address: {}", config.listen_addr());
    info!("  Tick rate: {}ms", config.server.tick_rate_ms);
    info!("  Wait for players: {}s", config.session.wait_for_players_secs);
    info!("  Max session length: {}s", config.session.max_session_secs);
    info!("  Log file: {}", config.log_file_path().display());
}
