use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::session::{ActionResponse, SessionSummary, StartSessionRequest},
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Routes driving the game-session lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{room_id}/sessions", post(start_session))
        .route("/rooms/{room_id}/emergency_stop", post(emergency_stop))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/pause", post(pause_session))
        .route("/sessions/{id}/resume", post(resume_session))
        .route("/sessions/{id}/halt", post(halt_session))
}

/// Start a new session for a room.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/sessions",
    tag = "sessions",
    params(("room_id" = String, Path, description = "Room to start a session in")),
    request_body = StartSessionRequest,
    responses(
        (status = 200, description = "Session started", body = SessionSummary),
        (status = 404, description = "Room is not configured"),
        (status = 409, description = "Room already has an active session")
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::start_session(&state, &room_id, payload).await?;
    Ok(Json(summary))
}

/// Request an emergency stop for a room.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/emergency_stop",
    tag = "sessions",
    params(("room_id" = String, Path, description = "Room to stop")),
    responses(
        (status = 200, description = "Emergency stop published", body = ActionResponse),
        (status = 404, description = "Room is not configured")
    )
)]
pub async fn emergency_stop(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    session_service::trigger_emergency_stop(&state, &room_id)?;
    Ok(Json(ActionResponse {
        message: format!("emergency stop published for room `{room_id}`"),
    }))
}

/// List every known session, newest first.
#[utoipa::path(
    get,
    path = "/sessions",
    tag = "sessions",
    responses((status = 200, description = "Known sessions", body = [SessionSummary]))
)]
pub async fn list_sessions(State(state): State<SharedState>) -> Json<Vec<SessionSummary>> {
    Json(session_service::list_sessions(&state).await)
}

/// Retrieve a session by its identifier.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Identifier of the session")),
    responses(
        (status = 200, description = "Session", body = SessionSummary),
        (status = 404, description = "Session not found")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::get_session(&state, id).await?;
    Ok(Json(summary))
}

/// Pause a running session.
#[utoipa::path(
    post,
    path = "/sessions/{id}/pause",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Identifier of the session")),
    responses(
        (status = 200, description = "Session paused", body = SessionSummary),
        (status = 409, description = "Session is not running")
    )
)]
pub async fn pause_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::pause_session(&state, id).await?;
    Ok(Json(summary))
}

/// Resume a paused session.
#[utoipa::path(
    post,
    path = "/sessions/{id}/resume",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Identifier of the session")),
    responses(
        (status = 200, description = "Session resumed", body = SessionSummary),
        (status = 409, description = "Session is not paused")
    )
)]
pub async fn resume_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::resume_session(&state, id).await?;
    Ok(Json(summary))
}

/// Halt a session terminally.
#[utoipa::path(
    post,
    path = "/sessions/{id}/halt",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Identifier of the session")),
    responses(
        (status = 200, description = "Session halted", body = SessionSummary),
        (status = 404, description = "Session not found")
    )
)]
pub async fn halt_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::halt_session(&state, id).await?;
    Ok(Json(summary))
}
