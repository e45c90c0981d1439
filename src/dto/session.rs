//! Session control-plane request and response bodies.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::state::session::{GameSession, SessionStatus};

/// Payload used to start a new game session for a room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartSessionRequest {
    /// Display name of the playing team.
    #[validate(length(min = 1, max = 64))]
    pub team_name: String,
    /// Number of players in the team.
    #[validate(range(min = 1, max = 16))]
    pub player_count: u32,
}

/// Session representation returned by the control API.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionSummary {
    /// Identifier of the session.
    pub session_id: Uuid,
    /// Room being played.
    pub room_id: String,
    /// Display name of the playing team.
    pub team_name: String,
    /// Number of players in the team.
    pub player_count: u32,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Solved flag per puzzle, in room-definition order.
    #[schema(value_type = Object)]
    pub puzzle_states: IndexMap<String, bool>,
    /// Creation timestamp of the session.
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String)]
    pub created_at: OffsetDateTime,
}

impl From<&GameSession> for SessionSummary {
    fn from(session: &GameSession) -> Self {
        Self {
            session_id: session.session_id,
            room_id: session.room_id.clone(),
            team_name: session.team_name.clone(),
            player_count: session.player_count,
            status: session.status(),
            puzzle_states: session.puzzle_states().clone(),
            created_at: session.created_at,
        }
    }
}

/// Acknowledgement returned by fire-and-forget control operations.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    /// Human-readable confirmation of the accepted action.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::*;

    #[test]
    fn start_request_bounds_are_enforced() {
        let valid = StartSessionRequest {
            team_name: "The Lockpickers".into(),
            player_count: 4,
        };
        assert!(valid.validate().is_ok());

        let empty_name = StartSessionRequest {
            team_name: String::new(),
            player_count: 4,
        };
        assert!(empty_name.validate().is_err());

        let crowd = StartSessionRequest {
            team_name: "team".into(),
            player_count: 40,
        };
        assert!(crowd.validate().is_err());
    }
}
