//! Game-session domain model and its status state machine.

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    domain::{DeviceKey, DeviceStateSnapshot, DeviceStates},
    puzzle::PuzzleDefinition,
};

/// Lifecycle status of a game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created but not yet started. Sessions started through the control
    /// plane begin in `Running`; `Idle` exists for feed consumers that model
    /// a room with no game in progress.
    Idle,
    /// Gameplay in progress; puzzle evaluation is active.
    Running,
    /// Gameplay suspended by the game master; puzzle evaluation is inactive.
    Paused,
    /// Terminally stopped, either explicitly or by an emergency stop.
    Halted,
    /// Every puzzle solved; terminal.
    Completed,
}

/// Status transitions a session can be asked to make.
///
/// Halting is not listed here: it is unconditional and handled by
/// [`GameSession::halt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    /// Suspend a running session.
    Pause,
    /// Resume a paused session.
    Resume,
    /// Mark the session finished once every puzzle is solved.
    Complete,
}

/// Error returned when a transition cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Status the session was in when the transition was requested.
    pub from: SessionStatus,
    /// The transition that cannot be applied from this status.
    pub event: SessionTransition,
}

/// One in-progress or finished play-through of a room by a team.
///
/// The device snapshots and puzzle states are exclusively owned by this
/// session; nothing is shared across sessions or rooms.
#[derive(Debug, Clone)]
pub struct GameSession {
    /// Primary identifier of the session.
    pub session_id: Uuid,
    /// Room being played.
    pub room_id: String,
    /// Display name of the playing team.
    pub team_name: String,
    /// Number of players in the team.
    pub player_count: u32,
    /// Creation timestamp for auditing/debugging.
    pub created_at: OffsetDateTime,
    status: SessionStatus,
    puzzle_states: IndexMap<String, bool>,
    device_states: DeviceStates,
}

impl GameSession {
    /// Build a new session in the `Running` status with every puzzle of the
    /// room unsolved.
    pub fn new(
        room_id: impl Into<String>,
        team_name: impl Into<String>,
        player_count: u32,
        puzzles: &[PuzzleDefinition],
    ) -> Self {
        let puzzle_states = puzzles
            .iter()
            .map(|puzzle| (puzzle.puzzle_id.clone(), false))
            .collect();

        Self {
            session_id: Uuid::new_v4(),
            room_id: room_id.into(),
            team_name: team_name.into(),
            player_count,
            created_at: OffsetDateTime::now_utc(),
            status: SessionStatus::Running,
            puzzle_states,
            device_states: DeviceStates::new(),
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Solved flag per puzzle, in room-definition order.
    pub fn puzzle_states(&self) -> &IndexMap<String, bool> {
        &self.puzzle_states
    }

    /// Latest device snapshots recorded for this session.
    pub fn device_states(&self) -> &DeviceStates {
        &self.device_states
    }

    /// Apply a status transition atomically.
    pub fn apply(&mut self, event: SessionTransition) -> Result<SessionStatus, InvalidTransition> {
        let next = match (self.status, event) {
            (SessionStatus::Running, SessionTransition::Pause) => SessionStatus::Paused,
            (SessionStatus::Paused, SessionTransition::Resume) => SessionStatus::Running,
            (SessionStatus::Running, SessionTransition::Complete) => SessionStatus::Completed,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        self.status = next;
        Ok(next)
    }

    /// Halt the session, terminally, regardless of its current status.
    ///
    /// Accepting the halt from any status keeps an emergency stop
    /// redelivered under at-least-once semantics a no-op.
    pub fn halt(&mut self) -> SessionStatus {
        self.status = SessionStatus::Halted;
        SessionStatus::Halted
    }

    /// Replace the snapshot for one device with a newer report.
    ///
    /// The new payload fully replaces the old one; snapshots are never merged
    /// partially. Latest-received wins, by arrival rather than by embedded
    /// timestamp, since hardware clocks are not assumed synchronized.
    pub fn record_snapshot(&mut self, key: DeviceKey, snapshot: DeviceStateSnapshot) {
        self.device_states.insert(key, snapshot);
    }

    /// Whether a puzzle is already marked solved.
    pub fn is_solved(&self, puzzle_id: &str) -> bool {
        self.puzzle_states.get(puzzle_id).copied().unwrap_or(false)
    }

    /// Mark a puzzle solved, returning `true` when the flag actually flipped.
    ///
    /// Solving is monotonic: there is no way to mark a puzzle unsolved again.
    pub fn mark_solved(&mut self, puzzle_id: &str) -> bool {
        match self.puzzle_states.get_mut(puzzle_id) {
            Some(solved) if !*solved => {
                *solved = true;
                true
            }
            _ => false,
        }
    }

    /// Whether every puzzle of the room is solved.
    pub fn all_solved(&self) -> bool {
        !self.puzzle_states.is_empty() && self.puzzle_states.values().all(|solved| *solved)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::puzzle::SolveCondition;

    use super::*;

    fn puzzles(ids: &[&str]) -> Vec<PuzzleDefinition> {
        ids.iter()
            .map(|id| PuzzleDefinition {
                puzzle_id: (*id).to_string(),
                name: (*id).to_string(),
                solve_condition: SolveCondition::DeviceMatches {
                    controller_id: "ctrl_1".into(),
                    device_id: (*id).to_string(),
                    key: "open".into(),
                    equals: json!(true),
                },
            })
            .collect()
    }

    #[test]
    fn new_session_runs_with_all_puzzles_unsolved() {
        let session = GameSession::new("room_demo", "The Lockpickers", 4, &puzzles(&["a", "b"]));
        assert_eq!(session.status(), SessionStatus::Running);
        assert!(session.puzzle_states().values().all(|solved| !solved));
        assert!(!session.all_solved());
    }

    #[test]
    fn pause_and_resume_round_trip() {
        let mut session = GameSession::new("room_demo", "team", 2, &puzzles(&["a"]));
        assert_eq!(session.apply(SessionTransition::Pause).unwrap(), SessionStatus::Paused);
        assert_eq!(session.apply(SessionTransition::Resume).unwrap(), SessionStatus::Running);
    }

    #[test]
    fn resume_requires_a_paused_session() {
        let mut session = GameSession::new("room_demo", "team", 2, &puzzles(&["a"]));
        let err = session.apply(SessionTransition::Resume).unwrap_err();
        assert_eq!(err.from, SessionStatus::Running);
        assert_eq!(err.event, SessionTransition::Resume);
    }

    #[test]
    fn halt_applies_from_any_status_and_is_terminal() {
        let mut session = GameSession::new("room_demo", "team", 2, &puzzles(&["a"]));
        session.apply(SessionTransition::Pause).unwrap();
        assert_eq!(session.halt(), SessionStatus::Halted);

        // Redelivered halt is a no-op, not an error.
        assert_eq!(session.halt(), SessionStatus::Halted);

        let err = session.apply(SessionTransition::Resume).unwrap_err();
        assert_eq!(err.from, SessionStatus::Halted);
    }

    #[test]
    fn complete_requires_running() {
        let mut session = GameSession::new("room_demo", "team", 2, &puzzles(&["a"]));
        session.apply(SessionTransition::Pause).unwrap();
        assert!(session.apply(SessionTransition::Complete).is_err());
    }

    #[test]
    fn solving_is_monotonic() {
        let mut session = GameSession::new("room_demo", "team", 2, &puzzles(&["a", "b"]));
        assert!(session.mark_solved("a"));
        assert!(!session.mark_solved("a"), "second solve must not flip again");
        assert!(session.is_solved("a"));
        assert!(!session.all_solved());

        assert!(session.mark_solved("b"));
        assert!(session.all_solved());
    }

    #[test]
    fn unknown_puzzles_cannot_be_solved() {
        let mut session = GameSession::new("room_demo", "team", 2, &puzzles(&["a"]));
        assert!(!session.mark_solved("not_in_room"));
        assert!(!session.is_solved("not_in_room"));
    }

    #[test]
    fn room_without_puzzles_never_completes() {
        let session = GameSession::new("room_demo", "team", 2, &[]);
        assert!(!session.all_solved());
    }
}
