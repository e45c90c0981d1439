//! Controller liveness bookkeeping fed by heartbeat and status events.

use dashmap::DashMap;
use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Reported connectivity of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ControllerStatus {
    /// The controller announced itself online or is heartbeating.
    Online,
    /// The controller announced itself offline.
    Offline,
}

/// Latest liveness record for one controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerHealth {
    /// Controller identifier.
    pub controller_id: String,
    /// Room the controller reports from.
    pub room_id: String,
    /// Last announced connectivity.
    pub status: ControllerStatus,
    /// Origin timestamp of the most recent heartbeat or status event.
    pub last_seen: OffsetDateTime,
}

/// Map of controller liveness records used for external health reporting.
///
/// Liveness never mutates session status; it only feeds the `/controllers`
/// view.
#[derive(Default)]
pub struct LivenessTracker {
    controllers: DashMap<String, ControllerHealth>,
}

impl LivenessTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a heartbeat from a controller, marking it online.
    pub fn record_heartbeat(&self, controller_id: &str, room_id: &str, at: OffsetDateTime) {
        self.upsert(controller_id, room_id, ControllerStatus::Online, at);
    }

    /// Record an explicit online announcement.
    pub fn mark_online(&self, controller_id: &str, room_id: &str, at: OffsetDateTime) {
        self.upsert(controller_id, room_id, ControllerStatus::Online, at);
    }

    /// Record an explicit offline announcement.
    pub fn mark_offline(&self, controller_id: &str, room_id: &str, at: OffsetDateTime) {
        self.upsert(controller_id, room_id, ControllerStatus::Offline, at);
    }

    /// Snapshot every known controller record.
    pub fn snapshot(&self) -> Vec<ControllerHealth> {
        self.controllers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn upsert(&self, controller_id: &str, room_id: &str, status: ControllerStatus, at: OffsetDateTime) {
        self.controllers.insert(
            controller_id.to_string(),
            ControllerHealth {
                controller_id: controller_id.to_string(),
                room_id: room_id.to_string(),
                status,
                last_seen: at,
            },
        );
    }
}
