//! In-process stand-in for the orchestration platform.
//!
//! Lets the host run on a developer machine or in tests without the
//! platform agent: sessions are activated by calling into
//! [`LocalPlatform`] directly, and everything the host asks of the platform
//! is recorded so it can be inspected afterwards.

use super::{GameSessionInfo, OrchestrationPlatform, ProcessParameters, SessionUpdate, StopBackfillRequest};
use crate::error::PlatformCallError;
use crate::lifecycle::LifecycleHandle;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

#[derive(Debug, Default)]
struct LocalState {
    initialized: bool,
    handle: Option<LifecycleHandle>,
    port: Option<u16>,
    session_id: Option<String>,
    session_activated: bool,
    process_ending_calls: usize,
    destroyed: bool,
    backfill_stops: Vec<StopBackfillRequest>,
}

#[derive(Debug, Default)]
pub struct LocalPlatform {
    state: Mutex<LocalState>,
}

impl LocalPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, operation: &'static str) -> Result<LifecycleHandle, PlatformCallError> {
        self.state()
            .handle
            .clone()
            .ok_or_else(|| PlatformCallError::new(operation, "process is not ready"))
    }

    /// Deliver an activation callback as the platform would.
    pub fn activate_session_locally(&self, session: GameSessionInfo) -> Result<(), PlatformCallError> {
        let handle = self.handle("activate_session_locally")?;
        self.state().session_id = Some(session.game_session_id.clone());
        info!("Local platform activating session {}", session.game_session_id);
        handle.on_activate(session);
        Ok(())
    }

    /// Deliver a session-update callback.
    pub fn update_session_locally(&self, update: SessionUpdate) -> Result<(), PlatformCallError> {
        self.handle("update_session_locally")?.on_update(update);
        Ok(())
    }

    /// Deliver a process-terminate callback.
    pub fn terminate_process_locally(&self) -> Result<(), PlatformCallError> {
        self.handle("terminate_process_locally")?.on_terminate();
        Ok(())
    }

    /// Poll the host's health check the way the platform does periodically.
    pub fn check_health(&self) -> Option<bool> {
        self.state().handle.as_ref().map(LifecycleHandle::on_health_check)
    }

    pub fn ready_port(&self) -> Option<u16> {
        self.state().port
    }

    pub fn is_session_activated(&self) -> bool {
        self.state().session_activated
    }

    pub fn process_ending_calls(&self) -> usize {
        self.state().process_ending_calls
    }

    pub fn is_destroyed(&self) -> bool {
        self.state().destroyed
    }

    pub fn backfill_stops(&self) -> Vec<StopBackfillRequest> {
        self.state().backfill_stops.clone()
    }
}

impl OrchestrationPlatform for LocalPlatform {
    fn init_sdk(&self) -> Result<(), PlatformCallError> {
        self.state().initialized = true;
        Ok(())
    }

    fn process_ready(&self, params: ProcessParameters) -> Result<(), PlatformCallError> {
        let mut state = self.state();
        if !state.initialized {
            return Err(PlatformCallError::new("process_ready", "InitSDK has not been called"));
        }
        info!(
            "Local platform: process ready on port {} (logs: {:?})",
            params.port, params.log_paths
        );
        state.port = Some(params.port);
        state.handle = Some(params.handle);
        Ok(())
    }

    fn activate_session(&self) -> Result<(), PlatformCallError> {
        let mut state = self.state();
        if state.session_id.is_none() {
            return Err(PlatformCallError::new("activate_session", "no game session was started"));
        }
        state.session_activated = true;
        Ok(())
    }

    fn process_ending(&self) -> Result<(), PlatformCallError> {
        self.state().process_ending_calls += 1;
        Ok(())
    }

    fn destroy(&self) -> Result<(), PlatformCallError> {
        let mut state = self.state();
        state.destroyed = true;
        state.handle = None;
        Ok(())
    }

    fn current_session_id(&self) -> Result<String, PlatformCallError> {
        self.state()
            .session_id
            .clone()
            .ok_or_else(|| PlatformCallError::new("current_session_id", "no active game session"))
    }

    fn request_backfill_stop(&self, request: &StopBackfillRequest) -> Result<(), PlatformCallError> {
        self.state().backfill_stops.push(request.clone());
        Ok(())
    }
}
