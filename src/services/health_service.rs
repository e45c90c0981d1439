use crate::{
    dto::health::{ControllerSummary, HealthResponse},
    state::SharedState,
};

/// Report service health from the transport connection signal.
pub fn health_status(state: &SharedState) -> HealthResponse {
    let active_sessions = state.sessions().active_count();
    if state.is_connected() {
        HealthResponse::ok(active_sessions)
    } else {
        HealthResponse::degraded(active_sessions)
    }
}

/// Snapshot the controller liveness bookkeeping for external reporting.
pub fn controller_overview(state: &SharedState) -> Vec<ControllerSummary> {
    let mut controllers: Vec<ControllerSummary> = state
        .liveness()
        .snapshot()
        .into_iter()
        .map(Into::into)
        .collect();
    controllers.sort_by(|a, b| a.controller_id.cmp(&b.controller_id));
    controllers
}
