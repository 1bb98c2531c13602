//! Core game host implementation.
//!
//! [`GameHost`] ties the platform seam, the connection registry and the
//! session lifecycle together. Accepting runs on its own tokio task and only
//! ever adds to the registry; everything that changes session state runs on
//! the tick loop inside [`GameHost::run`].

use crate::config::Config;
use crate::connection::{ClientId, ConnectionRegistry};
use crate::error::ServerError;
use crate::lifecycle::{HealthCheck, LifecycleHandle, SessionLifecycleManager};
use crate::metrics::MetricsSink;
use crate::platform::{OrchestrationPlatform, ProcessParameters};
use crate::session::SessionPhase;
use game_protocol::{FrameCodec, Message, MessageKind};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Receives every client message after the host has handled it.
pub type InboxReceiver = mpsc::UnboundedReceiver<(ClientId, Message)>;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A single game server process hosting at most one session.
pub struct GameHost {
    config: Config,
    platform: Arc<dyn OrchestrationPlatform>,
    registry: Arc<ConnectionRegistry>,
    lifecycle: SessionLifecycleManager,
    inbox: Option<mpsc::UnboundedSender<(ClientId, Message)>>,
    /// Clients that sent `Connect` and have not left. Survives activation so
    /// a join that arrived while `Idle` still starts the game.
    joined: HashSet<ClientId>,
}

impl GameHost {
    /// Creates a host from validated configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded configuration (see [`crate::config::load_config`])
    /// * `platform` - The orchestration platform this process reports to
    /// * `metrics` - Where session metrics are sent
    ///
    /// # Errors
    ///
    /// [`ServerError::Config`] if the session thresholds are unusable.
    pub fn new(
        config: Config,
        platform: Arc<dyn OrchestrationPlatform>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, ServerError> {
        let registry = Arc::new(ConnectionRegistry::new(FrameCodec::new(
            config.server.max_frame_size,
        )));
        let lifecycle = SessionLifecycleManager::new(
            config.lifecycle_config()?,
            platform.clone(),
            registry.clone(),
            metrics,
        );

        Ok(Self {
            config,
            platform,
            registry,
            lifecycle,
            inbox: None,
            joined: HashSet::new(),
        })
    }

    /// Replace the health check reported to the platform.
    ///
    /// Must be called before [`GameHost::run`], which hands the platform its
    /// callback handle.
    pub fn with_health_check(mut self, health: Arc<dyn HealthCheck>) -> Self {
        self.lifecycle = self.lifecycle.with_health_check(health);
        self
    }

    /// Handle for delivering lifecycle events from outside the tick loop.
    pub fn handle(&self) -> LifecycleHandle {
        self.lifecycle.handle()
    }

    /// The live connections, for sending to clients.
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    /// Route client messages to the game layer.
    ///
    /// Only the first call returns a receiver. Until it is taken, messages
    /// are handled by the host and then dropped.
    pub fn take_inbox(&mut self) -> Option<InboxReceiver> {
        if self.inbox.is_some() {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.inbox = Some(tx);
        Some(rx)
    }

    /// Runs the host until the session lifecycle asks for the process to exit.
    ///
    /// # Startup Sequence
    ///
    /// 1. Initialize the platform SDK
    /// 2. Declare the process ready, with the listening port and log paths
    /// 3. Start accepting client connections
    /// 4. Tick until exit is requested; `shutdown` resolving terminates the session
    /// 5. Stop accepting and release the platform connection
    ///
    /// # Errors
    ///
    /// Fails without ticking if the platform cannot be initialized or refuses
    /// the ready call. Session-level failures never end `run` early.
    pub async fn run<F>(mut self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!("🚀 Starting game host on {}", local_addr);

        if let Err(e) = self.platform.init_sdk() {
            error!("Platform SDK initialization failed: {}", e);
            return Err(e.into());
        }

        let log_paths = vec![self.config.log_file_path()];
        if let Err(e) = self.platform.process_ready(ProcessParameters {
            port: local_addr.port(),
            log_paths,
            handle: self.lifecycle.handle(),
        }) {
            error!("Process ready failed: {}", e);
            return Err(e.into());
        }
        info!("✅ Process ready, waiting for a game session");

        let accept_task = tokio::spawn(accept_loop(listener, self.registry.clone()));

        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        let mut shutdown_received = false;
        let max_delta = self.config.max_tick_delta();
        let mut last_tick = Instant::now();

        while !self.lifecycle.exit_requested() {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last_tick);
                    last_tick = now;
                    if elapsed > max_delta {
                        warn!(
                            "Tick loop stalled for {:.2?}, charging only {:.2?} to the session timers",
                            elapsed, max_delta
                        );
                    }
                    self.tick(elapsed.min(max_delta));
                }
                _ = &mut shutdown, if !shutdown_received => {
                    shutdown_received = true;
                    info!("Shutdown signal received");
                    self.lifecycle.terminate_game_session();
                }
            }
        }

        accept_task.abort();
        if let Err(e) = self.platform.destroy() {
            error!("Failed to release platform connection: {}", e);
        }
        info!("🧹 Game host stopped");
        Ok(())
    }

    /// One pass of the game loop: lifecycle first, then client traffic.
    fn tick(&mut self, delta: Duration) {
        self.lifecycle.tick(delta);
        if self.lifecycle.exit_requested() {
            return;
        }
        self.start_if_players_waiting();

        for (client_id, message) in self.registry.drain_all() {
            self.handle_message(client_id, message);
        }
        self.registry.flush_all();
    }

    fn handle_message(&mut self, client_id: ClientId, message: Message) {
        match message.kind {
            MessageKind::Connect => {
                info!("👋 Client {} joined", client_id);
                self.joined.insert(client_id);
                self.start_if_players_waiting();
            }
            MessageKind::Disconnect => {
                info!("👋 Client {} left", client_id);
                self.joined.remove(&client_id);
                self.registry.remove(client_id);
            }
            kind => debug!("{:?} from {}", kind, client_id),
        }

        if let Some(inbox) = &self.inbox {
            if inbox.send((client_id, message)).is_err() {
                debug!("Game inbox closed, no longer forwarding client messages");
                self.inbox = None;
            }
        }
    }

    /// Starts the game once a session is awaiting players and a joined
    /// client is still connected.
    fn start_if_players_waiting(&mut self) {
        if self.lifecycle.phase() != SessionPhase::AwaitingPlayers {
            return;
        }
        let registry = &self.registry;
        self.joined.retain(|client_id| registry.contains(*client_id));
        if !self.joined.is_empty() {
            self.lifecycle.start_game();
        }
    }
}

async fn accept_loop(listener: TcpListener, registry: Arc<ConnectionRegistry>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                }
                // Stays non-blocking after conversion.
                let stream = match stream.into_std() {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!("Failed to take over connection from {}: {}", addr, e);
                        continue;
                    }
                };
                match registry.add(stream) {
                    Some(client_id) => info!("🔗 Client {} connected from {}", client_id, addr),
                    None => info!("Refused connection from {}: session is over", addr),
                }
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}
