//! Error types for the game host.
//!
//! Errors are scoped to the component that produces them so that a failure
//! in one connection or one platform call never looks like a failure of the
//! whole session:
//!
//! * [`ChannelError`] - a single client connection failed (connection-fatal, session-safe)
//! * [`PlatformCallError`] - an orchestration platform operation failed
//! * [`BackfillCancelError`] - stopping the matchmaking backfill failed (best effort)
//! * [`ServerError`] - the host runtime itself could not start or keep running

use game_protocol::ProtocolError;
use std::io;
use thiserror::Error;

/// Failure of a single client connection.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The peer sent a frame that cannot be decoded; the channel is closed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Writing to the stream failed; the channel is closed.
    #[error("send failed: {0}")]
    SendFailed(#[source] io::Error),

    /// The peer closed the stream or the read side failed.
    #[error("peer disconnected")]
    Disconnected,

    /// The channel was already closed before this call.
    #[error("connection is closed")]
    Closed,
}

/// An orchestration platform operation returned a failure outcome.
#[derive(Debug, Clone, Error)]
#[error("platform call `{operation}` failed: {reason}")]
pub struct PlatformCallError {
    pub operation: &'static str,
    pub reason: String,
}

impl PlatformCallError {
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }
}

/// Stopping the backfill ticket failed. Logged, never blocks teardown.
#[derive(Debug, Error)]
pub enum BackfillCancelError {
    #[error("backfill ticket {ticket_id} has no matchmaking configuration to cancel against")]
    MissingConfiguration { ticket_id: String },

    #[error(transparent)]
    Platform(#[from] PlatformCallError),
}

/// Errors that stop the host runtime.
#[derive(Debug, Error)]
pub enum ServerError {
    /// `InitSDK` or `ProcessReady` failed; the process must not accept sessions.
    #[error(transparent)]
    Platform(#[from] PlatformCallError),

    #[error("network error: {0}")]
    Network(#[from] io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}
