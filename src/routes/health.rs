use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::health::{ControllerSummary, HealthResponse},
    services::health_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "health",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
/// Return the current health status derived from the broker connection.
pub async fn healthcheck(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(health_service::health_status(&state))
}

#[utoipa::path(
    get,
    path = "/controllers",
    tag = "health",
    responses((status = 200, description = "Controller liveness records", body = [ControllerSummary]))
)]
/// List the liveness bookkeeping for every controller seen so far.
pub async fn list_controllers(State(state): State<SharedState>) -> Json<Vec<ControllerSummary>> {
    Json(health_service::controller_overview(&state))
}

/// Configure the health routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/healthcheck", get(healthcheck))
        .route("/controllers", get(list_controllers))
}
