//! Callback entry points for the orchestration platform and the game layer.
//!
//! The platform delivers callbacks on threads the host does not control.
//! [`LifecycleHandle`] turns each callback into a [`LifecycleEvent`] on a
//! single-consumer queue; the lifecycle manager applies them in order from
//! the tick loop, so no transition ever runs on the caller's thread.

use crate::platform::{GameSessionInfo, SessionUpdate};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// One queued request for a lifecycle transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The platform assigned a game session to this process.
    Activate(GameSessionInfo),
    /// The platform updated the session (e.g. a new backfill ticket).
    Update(SessionUpdate),
    /// The game layer saw a player join.
    StartGame,
    /// The game layer asked to end the session.
    TerminateSession,
    /// The platform is shutting the process down.
    ProcessTerminate,
}

/// Health predicate polled by the platform.
///
/// Must answer quickly: a late answer counts as unhealthy on the platform
/// side.
pub trait HealthCheck: Send + Sync {
    fn is_healthy(&self) -> bool;
}

/// No internal condition currently degrades health.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysHealthy;

impl HealthCheck for AlwaysHealthy {
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Cloneable, thread-safe sender of lifecycle events.
#[derive(Clone)]
pub struct LifecycleHandle {
    events: mpsc::UnboundedSender<LifecycleEvent>,
    health: Arc<dyn HealthCheck>,
}

impl LifecycleHandle {
    pub fn new(events: mpsc::UnboundedSender<LifecycleEvent>, health: Arc<dyn HealthCheck>) -> Self {
        Self { events, health }
    }

    pub fn on_activate(&self, session: GameSessionInfo) {
        self.enqueue(LifecycleEvent::Activate(session));
    }

    pub fn on_update(&self, update: SessionUpdate) {
        self.enqueue(LifecycleEvent::Update(update));
    }

    pub fn on_terminate(&self) {
        self.enqueue(LifecycleEvent::ProcessTerminate);
    }

    /// Answered immediately on the calling thread; never queued.
    pub fn on_health_check(&self) -> bool {
        self.health.is_healthy()
    }

    pub fn start_game(&self) {
        self.enqueue(LifecycleEvent::StartGame);
    }

    pub fn terminate_session(&self) {
        self.enqueue(LifecycleEvent::TerminateSession);
    }

    fn enqueue(&self, event: LifecycleEvent) {
        if let Err(mpsc::error::SendError(event)) = self.events.send(event) {
            debug!("Lifecycle manager is gone, dropping {:?}", event);
        }
    }
}

impl fmt::Debug for LifecycleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHandle")
            .field("closed", &self.events.is_closed())
            .finish()
    }
}
