use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::SOURCE_CONTROL_PLANE,
    dto::session::{SessionSummary, StartSessionRequest},
    error::ServiceError,
    services::bus_events,
    state::{
        SharedState,
        session::{GameSession, SessionTransition},
    },
};

/// Start a new session for a configured room.
///
/// This is the explicit external trigger of the session lifecycle; the
/// repository rejects the start when the room already has an active session,
/// and that rejection propagates to the caller untouched.
pub async fn start_session(
    state: &SharedState,
    room_id: &str,
    request: StartSessionRequest,
) -> Result<SessionSummary, ServiceError> {
    request.validate()?;

    let Some(room) = state.room(room_id) else {
        return Err(ServiceError::NotFound(format!(
            "room `{room_id}` is not configured"
        )));
    };

    let session = GameSession::new(room_id, request.team_name, request.player_count, &room.puzzles);
    let handle = state.sessions().create(session)?;

    let session = handle.lock().await;
    info!(room_id, session_id = %session.session_id, "session started");
    bus_events::publish_session_started(state, &session);
    Ok(SessionSummary::from(&*session))
}

/// Pause a running session.
pub async fn pause_session(
    state: &SharedState,
    session_id: Uuid,
) -> Result<SessionSummary, ServiceError> {
    let handle = state.sessions().get(session_id)?;
    let mut session = handle.lock().await;
    session.apply(SessionTransition::Pause)?;
    info!(session_id = %session.session_id, "session paused");
    bus_events::publish_session_paused(state, &session);
    Ok(SessionSummary::from(&*session))
}

/// Resume a paused session.
pub async fn resume_session(
    state: &SharedState,
    session_id: Uuid,
) -> Result<SessionSummary, ServiceError> {
    let handle = state.sessions().get(session_id)?;
    let mut session = handle.lock().await;
    session.apply(SessionTransition::Resume)?;
    info!(session_id = %session.session_id, "session resumed");
    bus_events::publish_session_resumed(state, &session);
    Ok(SessionSummary::from(&*session))
}

/// Halt a session terminally and release its room.
pub async fn halt_session(
    state: &SharedState,
    session_id: Uuid,
) -> Result<SessionSummary, ServiceError> {
    let handle = state.sessions().get(session_id)?;
    let mut session = handle.lock().await;
    session.halt();
    state
        .sessions()
        .release_room(&session.room_id, session.session_id);
    info!(session_id = %session.session_id, "session halted");
    bus_events::publish_session_halted(state, &session, "manual_stop", SOURCE_CONTROL_PLANE);
    Ok(SessionSummary::from(&*session))
}

/// Look up one session by its identifier.
pub async fn get_session(
    state: &SharedState,
    session_id: Uuid,
) -> Result<SessionSummary, ServiceError> {
    let handle = state.sessions().get(session_id)?;
    let session = handle.lock().await;
    Ok(SessionSummary::from(&*session))
}

/// List every known session, newest first.
pub async fn list_sessions(state: &SharedState) -> Vec<SessionSummary> {
    let mut summaries = Vec::new();
    for handle in state.sessions().list() {
        let session = handle.lock().await;
        summaries.push(SessionSummary::from(&*session));
    }
    summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    summaries
}

/// Publish an emergency stop for a room; the orchestrator performs the halt.
pub fn trigger_emergency_stop(state: &SharedState, room_id: &str) -> Result<(), ServiceError> {
    if state.room(room_id).is_none() {
        return Err(ServiceError::NotFound(format!(
            "room `{room_id}` is not configured"
        )));
    }
    info!(room_id, "emergency stop requested");
    bus_events::publish_emergency_stop(state, room_id);
    Ok(())
}
