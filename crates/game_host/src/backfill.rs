//! Matchmaking backfill tracking.
//!
//! A session created by the matchmaker may carry a backfill ticket that keeps
//! filling empty slots after the game started. The controller remembers the
//! current ticket and stops it, once, when the session ends.

use crate::error::BackfillCancelError;
use crate::platform::{OrchestrationPlatform, StopBackfillRequest};
use tracing::{debug, info, warn};

/// The backfill ticket currently associated with the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackfillTicket {
    pub ticket_id: String,
    pub matchmaking_configuration_arn: Option<String>,
    /// Session id captured at activation.
    pub session_id: String,
}

/// Tracks at most one live backfill ticket.
#[derive(Debug, Default)]
pub struct BackfillController {
    ticket: Option<BackfillTicket>,
    matchmaking_configuration_arn: Option<String>,
    session_id: String,
}

impl BackfillController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the ticket from session activation.
    ///
    /// Sessions that were not created through matchmaking have no ticket;
    /// the controller then stays inert until an update supplies one.
    pub fn begin(
        &mut self,
        session_id: &str,
        ticket_id: Option<&str>,
        matchmaking_configuration_arn: Option<&str>,
    ) {
        self.session_id = session_id.to_string();
        self.matchmaking_configuration_arn = matchmaking_configuration_arn.map(str::to_string);
        self.ticket = ticket_id.filter(|id| !id.is_empty()).map(|id| self.ticket_for(id));
        if let Some(ticket) = &self.ticket {
            debug!("Tracking backfill ticket {} for session {}", ticket.ticket_id, session_id);
        }
    }

    /// Replace the tracked ticket with `ticket_id`.
    ///
    /// Absent or empty ids are ignored and the previous ticket is kept.
    pub fn update(&mut self, ticket_id: Option<&str>) {
        let Some(ticket_id) = ticket_id.filter(|id| !id.is_empty()) else {
            return;
        };
        info!("Updating backfill ticket id: {}", ticket_id);
        self.ticket = Some(self.ticket_for(ticket_id));
    }

    pub fn ticket(&self) -> Option<&BackfillTicket> {
        self.ticket.as_ref()
    }

    /// Stop the tracked backfill ticket.
    ///
    /// The session id sent to the platform is asked for at cancellation time,
    /// since the platform is the source of truth; the id captured at
    /// activation is only used if that lookup fails.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if a stop request was issued, `Ok(false)` if no ticket was
    /// tracked. The ticket is released before the request is made, so a
    /// second call is always a no-op even if the first one failed.
    pub fn cancel(&mut self, platform: &dyn OrchestrationPlatform) -> Result<bool, BackfillCancelError> {
        let Some(ticket) = self.ticket.take() else {
            return Ok(false);
        };

        let Some(matchmaking_configuration_arn) = ticket.matchmaking_configuration_arn else {
            return Err(BackfillCancelError::MissingConfiguration {
                ticket_id: ticket.ticket_id,
            });
        };

        let game_session_arn = platform.current_session_id().unwrap_or_else(|e| {
            warn!("Falling back to activation-time session id for backfill stop: {}", e);
            ticket.session_id.clone()
        });

        info!("Stopping backfill ticket {}", ticket.ticket_id);
        platform.request_backfill_stop(&StopBackfillRequest {
            ticket_id: ticket.ticket_id,
            matchmaking_configuration_arn,
            game_session_arn,
        })?;
        Ok(true)
    }

    fn ticket_for(&self, ticket_id: &str) -> BackfillTicket {
        BackfillTicket {
            ticket_id: ticket_id.to_string(),
            matchmaking_configuration_arn: self.matchmaking_configuration_arn.clone(),
            session_id: self.session_id.clone(),
        }
    }
}
