//! Seam to the orchestration platform that hosts this process.
//!
//! The platform starts and stops game server processes, hands them game
//! sessions and matchmaking backfill tickets, and polls their health. Its
//! control channel is an external API; this module only names the
//! operations the host performs against it ([`OrchestrationPlatform`]) and
//! the data it exchanges.
//!
//! Callbacks flow the other way through the [`LifecycleHandle`] passed in
//! [`ProcessParameters`].

pub mod local;

pub use local::LocalPlatform;

use crate::error::PlatformCallError;
use crate::lifecycle::LifecycleHandle;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Game session description delivered with the activation callback.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSessionInfo {
    /// Platform-issued, globally unique session id (an ARN-like path).
    pub game_session_id: String,
    pub name: Option<String>,
    pub maximum_player_session_count: u32,
    /// Raw matchmaker JSON, present when the session came from matchmaking.
    pub matchmaker_data: Option<String>,
}

/// Payload of the session-update callback.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub game_session: GameSessionInfo,
    /// The backfill ticket now associated with the session, if the platform reports one.
    pub backfill_ticket_id: Option<String>,
}

/// Arguments of a stop-backfill request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopBackfillRequest {
    pub ticket_id: String,
    pub matchmaking_configuration_arn: String,
    pub game_session_arn: String,
}

/// What the process tells the platform when it declares itself ready.
#[derive(Clone, Debug)]
pub struct ProcessParameters {
    /// Port clients connect to.
    pub port: u16,
    /// Log files the platform should collect after the process ends.
    pub log_paths: Vec<PathBuf>,
    /// Where the platform delivers lifecycle callbacks.
    pub handle: LifecycleHandle,
}

/// Operations the host performs against the orchestration platform.
///
/// Implementations must be callable from any thread; callbacks they deliver
/// go through the handle in [`ProcessParameters`] and are never executed on
/// the platform's own thread.
pub trait OrchestrationPlatform: Send + Sync {
    /// Open the local connection to the platform agent.
    fn init_sdk(&self) -> Result<(), PlatformCallError>;

    /// Declare the process ready to host sessions.
    fn process_ready(&self, params: ProcessParameters) -> Result<(), PlatformCallError>;

    /// Acknowledge an activation: the session is now accepting players.
    fn activate_session(&self) -> Result<(), PlatformCallError>;

    /// Announce that the process is shutting down.
    fn process_ending(&self) -> Result<(), PlatformCallError>;

    /// Release the connection to the platform agent.
    fn destroy(&self) -> Result<(), PlatformCallError>;

    /// The platform's current view of the session id.
    fn current_session_id(&self) -> Result<String, PlatformCallError>;

    /// Stop matchmaking backfill for a ticket.
    fn request_backfill_stop(&self, request: &StopBackfillRequest) -> Result<(), PlatformCallError>;
}
