//! Builders publishing follow-on domain events onto the bus.

use serde::Serialize;
use serde_json::json;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::{
    domain::{DomainEvent, EventType, SOURCE_CONTROL_PLANE, SOURCE_ORCHESTRATOR},
    puzzle::PuzzleDefinition,
    state::{
        SharedState,
        session::{GameSession, SessionStatus},
    },
};

/// Session lifecycle notification payload.
#[derive(Serialize)]
struct SessionLifecyclePayload<'a> {
    session_id: Uuid,
    team_name: &'a str,
    player_count: u32,
    status: SessionStatus,
}

impl<'a> From<&'a GameSession> for SessionLifecyclePayload<'a> {
    fn from(session: &'a GameSession) -> Self {
        Self {
            session_id: session.session_id,
            team_name: &session.team_name,
            player_count: session.player_count,
            status: session.status(),
        }
    }
}

/// Halt notification payload, carrying why the session stopped.
#[derive(Serialize)]
struct SessionHaltedPayload<'a> {
    session_id: Uuid,
    team_name: &'a str,
    reason: &'a str,
}

/// Payload published when a puzzle's solve condition is first satisfied.
#[derive(Serialize)]
struct PuzzleSolvedPayload<'a> {
    session_id: Uuid,
    puzzle_id: &'a str,
    name: &'a str,
}

/// Payload published when every puzzle of the room is solved.
#[derive(Serialize)]
struct SceneAdvancedPayload {
    session_id: Uuid,
    scene: &'static str,
    puzzles_solved: usize,
}

/// Publish that a session was started for its room.
pub fn publish_session_started(state: &SharedState, session: &GameSession) {
    publish(
        state,
        EventType::SessionStarted,
        &session.room_id,
        &SessionLifecyclePayload::from(session),
        SOURCE_CONTROL_PLANE,
    );
}

/// Publish that a running session was paused.
pub fn publish_session_paused(state: &SharedState, session: &GameSession) {
    publish(
        state,
        EventType::SessionPaused,
        &session.room_id,
        &SessionLifecyclePayload::from(session),
        SOURCE_CONTROL_PLANE,
    );
}

/// Publish that a paused session was resumed.
pub fn publish_session_resumed(state: &SharedState, session: &GameSession) {
    publish(
        state,
        EventType::SessionResumed,
        &session.room_id,
        &SessionLifecyclePayload::from(session),
        SOURCE_CONTROL_PLANE,
    );
}

/// Publish that a session reached the halted status.
pub fn publish_session_halted(state: &SharedState, session: &GameSession, reason: &str, source: &str) {
    publish(
        state,
        EventType::SessionHalted,
        &session.room_id,
        &SessionHaltedPayload {
            session_id: session.session_id,
            team_name: &session.team_name,
            reason,
        },
        source,
    );
}

/// Publish an emergency-stop request for a room.
///
/// The orchestrator consumes this event and performs the actual halt; the
/// publisher only records that the stop was requested.
pub fn publish_emergency_stop(state: &SharedState, room_id: &str) {
    state.events().publish(DomainEvent::new(
        EventType::EmergencyStopTriggered,
        room_id,
        json!({}),
        OffsetDateTime::now_utc(),
        SOURCE_CONTROL_PLANE,
    ));
}

/// Publish that a puzzle flipped to solved.
pub fn publish_puzzle_solved(state: &SharedState, session: &GameSession, puzzle: &PuzzleDefinition) {
    publish(
        state,
        EventType::PuzzleSolved,
        &session.room_id,
        &PuzzleSolvedPayload {
            session_id: session.session_id,
            puzzle_id: &puzzle.puzzle_id,
            name: &puzzle.name,
        },
        SOURCE_ORCHESTRATOR,
    );
}

/// Publish that the room completed and the scene advanced.
pub fn publish_scene_advanced(state: &SharedState, session: &GameSession) {
    publish(
        state,
        EventType::SceneAdvanced,
        &session.room_id,
        &SceneAdvancedPayload {
            session_id: session.session_id,
            scene: "room_complete",
            puzzles_solved: session.puzzle_states().len(),
        },
        SOURCE_ORCHESTRATOR,
    );
}

fn publish(state: &SharedState, kind: EventType, room_id: &str, payload: &impl Serialize, source: &str) {
    match serde_json::to_value(payload) {
        Ok(value) => state.events().publish(DomainEvent::new(
            kind,
            room_id,
            value,
            OffsetDateTime::now_utc(),
            source,
        )),
        Err(err) => warn!(kind = kind.as_str(), error = %err, "failed to serialize event payload"),
    }
}
