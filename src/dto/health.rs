use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::state::liveness::{ControllerHealth, ControllerStatus};

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status (`ok` or `degraded`).
    pub status: String,
    /// Whether the hardware broker connection is currently up.
    pub broker_connected: bool,
    /// Number of rooms with an active session.
    pub active_sessions: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(active_sessions: usize) -> Self {
        Self {
            status: "ok".to_string(),
            broker_connected: true,
            active_sessions,
        }
    }

    /// Create a health response indicating the broker connection is down.
    pub fn degraded(active_sessions: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            broker_connected: false,
            active_sessions,
        }
    }
}

/// Controller liveness record returned by the `/controllers` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct ControllerSummary {
    /// Controller identifier.
    pub controller_id: String,
    /// Room the controller reports from.
    pub room_id: String,
    /// Last announced connectivity.
    pub status: ControllerStatus,
    /// Origin time of the most recent heartbeat or status event.
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String)]
    pub last_seen: OffsetDateTime,
}

impl From<ControllerHealth> for ControllerSummary {
    fn from(health: ControllerHealth) -> Self {
        Self {
            controller_id: health.controller_id,
            room_id: health.room_id,
            status: health.status,
            last_seen: health.last_seen,
        }
    }
}
