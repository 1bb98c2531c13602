//! Session data owned by the lifecycle manager.

use crate::platform::GameSessionInfo;
use serde::Deserialize;
use std::fmt;
use std::time::SystemTime;
use tracing::warn;

/// Where the hosted session is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// No session yet; waiting for the platform to activate one.
    Idle,
    /// Session activated, waiting for the first player.
    AwaitingPlayers,
    /// Game running.
    Active,
    /// Teardown in progress.
    Terminating,
    /// Teardown finished. Absorbing.
    Terminated,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Terminating | SessionPhase::Terminated)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::AwaitingPlayers => "awaiting_players",
            SessionPhase::Active => "active",
            SessionPhase::Terminating => "terminating",
            SessionPhase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// The subset of the platform's matchmaker JSON the host cares about.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchmakerMetadata {
    pub auto_backfill_ticket_id: Option<String>,
    pub matchmaking_configuration_arn: Option<String>,
}

impl MatchmakerMetadata {
    /// Parse the raw matchmaker data. Missing or unparseable data means
    /// the session did not come from matchmaking.
    pub fn from_json(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
            return Self::default();
        };
        serde_json::from_str(raw).unwrap_or_else(|e| {
            warn!("Ignoring unparseable matchmaker data: {}", e);
            Self::default()
        })
    }
}

/// The one game session this process hosts.
#[derive(Clone, Debug)]
pub struct GameSession {
    pub id: String,
    pub matchmaker: MatchmakerMetadata,
    pub activated_at: SystemTime,
}

impl GameSession {
    pub fn from_info(info: &GameSessionInfo) -> Self {
        Self {
            id: info.game_session_id.clone(),
            matchmaker: MatchmakerMetadata::from_json(info.matchmaker_data.as_deref()),
            activated_at: SystemTime::now(),
        }
    }

    /// The bare session id, without the ARN prefix and fleet segment.
    ///
    /// `arn:...:gamesession/fleet-123/gsess-456` becomes `gsess-456`; ids
    /// that do not have that shape are returned whole.
    pub fn short_id(&self) -> &str {
        self.id.split('/').nth(2).unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_matchmaker_fields() {
        let raw = r#"{
            "matchId": "m-1",
            "matchmakingConfigurationArn": "arn:aws:gamelift:us-east-1:1:matchmakingconfiguration/cfg",
            "autoBackfillTicketId": "ticket-1",
            "teams": []
        }"#;
        let meta = MatchmakerMetadata::from_json(Some(raw));
        assert_eq!(meta.auto_backfill_ticket_id.as_deref(), Some("ticket-1"));
        assert!(meta
            .matchmaking_configuration_arn
            .as_deref()
            .is_some_and(|arn| arn.ends_with("/cfg")));
    }

    #[test]
    fn bad_or_missing_matchmaker_data_is_empty() {
        assert_eq!(MatchmakerMetadata::from_json(None), MatchmakerMetadata::default());
        assert_eq!(MatchmakerMetadata::from_json(Some("")), MatchmakerMetadata::default());
        assert_eq!(
            MatchmakerMetadata::from_json(Some("not json")),
            MatchmakerMetadata::default()
        );
    }

    #[test]
    fn short_id_strips_arn_prefix() {
        let session = GameSession::from_info(&GameSessionInfo {
            game_session_id: "arn:aws:gamelift:us-east-1::gamesession/fleet-1/gsess-9".into(),
            ..Default::default()
        });
        assert_eq!(session.short_id(), "gsess-9");

        let plain = GameSession::from_info(&GameSessionInfo {
            game_session_id: "local-session".into(),
            ..Default::default()
        });
        assert_eq!(plain.short_id(), "local-session");
    }
}
