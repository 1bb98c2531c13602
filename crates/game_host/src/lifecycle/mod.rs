//! Session lifecycle state machine.
//!
//! [`SessionLifecycleManager`] owns the hosted [`GameSession`] from the
//! platform's activation callback until termination. It is driven from a
//! single task: platform callbacks and game-layer triggers arrive as queued
//! [`LifecycleEvent`]s and are applied at the start of each
//! [`tick`](SessionLifecycleManager::tick), followed by exactly one clock
//! advance and the timeout checks.
//!
//! ```text
//! Idle --activate--> AwaitingPlayers --start_game--> Active
//!                          |                           |
//!                    wait > 5s                   duration > 1200s
//!                          v                           v
//!                      Terminating --------------> Terminated
//! ```
//!
//! Any non-terminal phase can also be terminated explicitly or by the
//! platform. Terminated is absorbing: later events are dropped.

pub mod handle;

pub use handle::{AlwaysHealthy, HealthCheck, LifecycleEvent, LifecycleHandle};

use crate::backfill::BackfillController;
use crate::clock::{SessionClock, Timer};
use crate::metrics::MetricsSink;
use crate::platform::{GameSessionInfo, OrchestrationPlatform, SessionUpdate};
use crate::session::{GameSession, SessionPhase};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// How long an activated session waits for its first player.
pub const DEFAULT_WAIT_FOR_PLAYERS: Duration = Duration::from_secs(5);

/// Hard cap on a running game.
pub const DEFAULT_MAX_SESSION: Duration = Duration::from_secs(20 * 60);

/// Counter emitted once per activated session.
pub const SESSION_STARTED_METRIC: &str = "game.SessionStarted";

/// Timeout thresholds. Both fire strictly after the threshold is crossed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub wait_for_players: Duration,
    pub max_session: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            wait_for_players: DEFAULT_WAIT_FOR_PLAYERS,
            max_session: DEFAULT_MAX_SESSION,
        }
    }
}

/// Whatever holds the client connections; torn down with the session.
pub trait ConnectionTeardown: Send + Sync {
    /// Close every connection. Returns how many were closed.
    fn disconnect_all(&self) -> usize;
}

/// Single-writer owner of the session state.
pub struct SessionLifecycleManager {
    config: LifecycleConfig,
    phase: SessionPhase,
    session: Option<GameSession>,
    clock: SessionClock,
    backfill: BackfillController,
    game_started: bool,
    exit_requested: bool,

    platform: Arc<dyn OrchestrationPlatform>,
    connections: Arc<dyn ConnectionTeardown>,
    metrics: Arc<dyn MetricsSink>,

    sender: mpsc::UnboundedSender<LifecycleEvent>,
    events: mpsc::UnboundedReceiver<LifecycleEvent>,
    health: Arc<dyn HealthCheck>,
}

impl SessionLifecycleManager {
    pub fn new(
        config: LifecycleConfig,
        platform: Arc<dyn OrchestrationPlatform>,
        connections: Arc<dyn ConnectionTeardown>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let (sender, events) = mpsc::unbounded_channel();
        Self {
            config,
            phase: SessionPhase::Idle,
            session: None,
            clock: SessionClock::new(),
            backfill: BackfillController::new(),
            game_started: false,
            exit_requested: false,
            platform,
            connections,
            metrics,
            sender,
            events,
            health: Arc::new(AlwaysHealthy),
        }
    }

    /// Replace the health predicate reported to the platform.
    pub fn with_health_check(mut self, health: Arc<dyn HealthCheck>) -> Self {
        self.health = health;
        self
    }

    /// A handle for delivering callbacks from other threads.
    pub fn handle(&self) -> LifecycleHandle {
        LifecycleHandle::new(self.sender.clone(), self.health.clone())
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn game_started(&self) -> bool {
        self.game_started
    }

    /// Whether teardown has asked for the process to exit.
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn backfill(&self) -> &BackfillController {
        &self.backfill
    }

    /// Run one server tick.
    ///
    /// Applies queued events, advances the clock by the measured `delta`,
    /// then checks the wait timeout and the session duration, in that order.
    pub fn tick(&mut self, delta: Duration) {
        self.process_events();
        if self.phase.is_terminal() {
            return;
        }

        self.clock.advance(delta);

        if self.phase == SessionPhase::AwaitingPlayers
            && self.clock.has_exceeded(Timer::WaitForPlayers, self.config.wait_for_players)
        {
            info!(
                "No players in {:?} since the session started, terminating game session",
                self.config.wait_for_players
            );
            self.clock.reset(Timer::WaitForPlayers);
            self.clock.stop(Timer::WaitForPlayers);
            self.terminate_game_session();
            return;
        }

        if self.phase == SessionPhase::Active
            && self.clock.has_exceeded(Timer::SessionDuration, self.config.max_session)
        {
            info!(
                "Reached max game session length ({:?}), terminating game session",
                self.config.max_session
            );
            self.clock.reset(Timer::WaitForPlayers);
            self.clock.reset(Timer::SessionDuration);
            self.terminate_game_session();
        }
    }

    /// Apply every queued event in arrival order.
    pub fn process_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: LifecycleEvent) {
        if self.phase == SessionPhase::Terminated {
            debug!("Session already terminated, dropping {:?}", event);
            return;
        }
        match event {
            LifecycleEvent::Activate(info) => self.activate(info),
            LifecycleEvent::Update(update) => self.update(update),
            LifecycleEvent::StartGame => self.start_game(),
            LifecycleEvent::TerminateSession => {
                self.terminate_game_session();
            }
            LifecycleEvent::ProcessTerminate => {
                info!("Platform requested process termination");
                self.terminate_game_session();
            }
        }
    }

    fn activate(&mut self, info: GameSessionInfo) {
        if self.phase != SessionPhase::Idle {
            warn!(
                "Ignoring activation of {} while {}",
                info.game_session_id, self.phase
            );
            return;
        }

        let session = GameSession::from_info(&info);
        info!("🎮 Game session activated: {}", session.short_id());
        debug!("Matchmaker data: {:?}", info.matchmaker_data);

        self.backfill.begin(
            &session.id,
            session.matchmaker.auto_backfill_ticket_id.as_deref(),
            session.matchmaker.matchmaking_configuration_arn.as_deref(),
        );

        if let Err(e) = self.platform.activate_session() {
            error!("Failed to activate session {}: {}", session.id, e);
        }

        self.metrics.set_session_tag(session.short_id());
        self.metrics.increment(SESSION_STARTED_METRIC, 1);

        self.clock.reset(Timer::WaitForPlayers);
        self.clock.reset(Timer::SessionDuration);
        self.clock.start(Timer::WaitForPlayers);
        self.session = Some(session);
        self.phase = SessionPhase::AwaitingPlayers;
    }

    fn update(&mut self, update: SessionUpdate) {
        match self.phase {
            SessionPhase::AwaitingPlayers | SessionPhase::Active => {
                debug!(
                    "Session update, backfill ticket: {:?}",
                    update.backfill_ticket_id
                );
                self.backfill.update(update.backfill_ticket_id.as_deref());
            }
            phase => warn!("Ignoring session update while {}", phase),
        }
    }

    /// The game layer saw a player join: move from waiting to running.
    pub fn start_game(&mut self) {
        if self.phase != SessionPhase::AwaitingPlayers {
            warn!("Ignoring start_game while {}", self.phase);
            return;
        }
        info!("Starting game");
        self.clock.stop(Timer::WaitForPlayers);
        self.clock.reset(Timer::WaitForPlayers);
        self.clock.reset(Timer::SessionDuration);
        self.clock.start(Timer::SessionDuration);
        self.game_started = true;
        self.phase = SessionPhase::Active;
    }

    /// End the session for everyone and ask for the process to exit.
    ///
    /// Every teardown step runs even if an earlier one fails:
    ///
    /// 1. disconnect all clients
    /// 2. clear the game-started flag
    /// 3. stop matchmaking backfill, if a ticket is tracked
    /// 4. tell the platform the process is ending
    /// 5. request process exit
    ///
    /// # Returns
    ///
    /// `false` if termination had already happened; nothing is repeated.
    pub fn terminate_game_session(&mut self) -> bool {
        if self.phase.is_terminal() {
            info!("Game session already {}, ignoring terminate", self.phase);
            return false;
        }

        let session_id = self
            .session
            .as_ref()
            .map_or_else(|| "<none>".to_string(), |s| s.id.clone());
        info!("🛑 Terminating game session {}", session_id);
        self.phase = SessionPhase::Terminating;

        let disconnected = self.connections.disconnect_all();
        debug!("Disconnected {} client(s) from {}", disconnected, session_id);

        self.game_started = false;

        match self.backfill.cancel(self.platform.as_ref()) {
            Ok(true) => info!("Stopped backfill for {}", session_id),
            Ok(false) => {}
            Err(e) => error!("Failed to stop backfill for {}: {}", session_id, e),
        }

        if let Err(e) = self.platform.process_ending() {
            error!("Failed to signal process ending for {}: {}", session_id, e);
        }

        info!("Terminating process");
        self.exit_requested = true;

        self.clock.stop(Timer::WaitForPlayers);
        self.clock.stop(Timer::SessionDuration);
        self.session = None;
        self.phase = SessionPhase::Terminated;
        true
    }
}
