//! Canonical domain types shared by the gateway, the bus, and the orchestrator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

/// Component name stamped into events normalized by the ingestion gateway.
pub const SOURCE_GATEWAY: &str = "ingestion-gateway";
/// Component name stamped into events emitted by the orchestrator.
pub const SOURCE_ORCHESTRATOR: &str = "orchestrator";
/// Component name stamped into events emitted by the session control plane.
pub const SOURCE_CONTROL_PLANE: &str = "session-control";

/// Enumerated kind of a [`DomainEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A device reported a new state payload.
    DeviceStateChanged,
    /// A controller keep-alive beacon arrived.
    ControllerHeartbeat,
    /// A controller announced itself online.
    ControllerOnline,
    /// A controller announced itself offline.
    ControllerOffline,
    /// A game session was started for a room.
    SessionStarted,
    /// A running session was paused.
    SessionPaused,
    /// A paused session was resumed.
    SessionResumed,
    /// A session was halted, either explicitly or by an emergency stop.
    SessionHalted,
    /// A puzzle's solve condition flipped to satisfied.
    PuzzleSolved,
    /// Every puzzle in the room is solved; the session completed.
    SceneAdvanced,
    /// An emergency stop was requested for a room.
    EmergencyStopTriggered,
}

impl EventType {
    /// Stable wire name of the event kind, matching its serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::DeviceStateChanged => "device_state_changed",
            EventType::ControllerHeartbeat => "controller_heartbeat",
            EventType::ControllerOnline => "controller_online",
            EventType::ControllerOffline => "controller_offline",
            EventType::SessionStarted => "session_started",
            EventType::SessionPaused => "session_paused",
            EventType::SessionResumed => "session_resumed",
            EventType::SessionHalted => "session_halted",
            EventType::PuzzleSolved => "puzzle_solved",
            EventType::SceneAdvanced => "scene_advanced",
            EventType::EmergencyStopTriggered => "emergency_stop_triggered",
        }
    }
}

/// Canonical envelope published on the domain-events channel.
///
/// `event_id` is assigned exactly once, when the event is created, and never
/// reused: consumers treat two deliveries with the same id as the same
/// logical occurrence, which is what makes at-least-once delivery safe to
/// handle idempotently. Events are immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Globally unique identity of this occurrence.
    pub event_id: Uuid,
    /// Enumerated kind of the event.
    #[serde(rename = "type")]
    pub kind: EventType,
    /// Room the event belongs to.
    pub room_id: String,
    /// Originating controller, when the event has a hardware origin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller_id: Option<String>,
    /// Originating device, for device-scoped events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Kind-specific payload, opaque to the bus.
    pub payload: Value,
    /// Point in time of origin, not of processing.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Free-form annotations; at minimum the `source` component name.
    pub metadata: Map<String, Value>,
}

impl DomainEvent {
    /// Create an event with a fresh id and the mandatory `source` annotation.
    pub fn new(
        kind: EventType,
        room_id: impl Into<String>,
        payload: Value,
        timestamp: OffsetDateTime,
        source: &str,
    ) -> Self {
        let mut metadata = Map::new();
        metadata.insert("source".into(), Value::String(source.to_string()));
        Self {
            event_id: Uuid::new_v4(),
            kind,
            room_id: room_id.into(),
            controller_id: None,
            device_id: None,
            payload,
            timestamp,
            metadata,
        }
    }

    /// Attach the hardware origin identifiers to the envelope.
    pub fn with_origin(mut self, controller_id: Option<String>, device_id: Option<String>) -> Self {
        self.controller_id = controller_id;
        self.device_id = device_id;
        self
    }

    /// Record an extra metadata annotation on the envelope.
    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

/// Identity of a physical device within the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceKey {
    /// Controller the device is wired to.
    pub controller_id: String,
    /// Device identifier, unique per controller.
    pub device_id: String,
}

impl DeviceKey {
    /// Build a key from its two identifiers.
    pub fn new(controller_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            controller_id: controller_id.into(),
            device_id: device_id.into(),
        }
    }
}

/// State payload reported by a device.
///
/// Known hardware shapes are modeled explicitly; anything else is retained
/// verbatim so hardware types not yet modeled keep flowing through evaluation
/// and the event feed unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceState {
    /// Maglock with its lock state and supply voltage.
    Maglock {
        /// Whether the lock is engaged.
        locked: bool,
        /// Supply voltage measured at the lock.
        power: f64,
    },
    /// Momentary button.
    Button {
        /// Whether the button is currently pressed.
        pressed: bool,
    },
    /// Open/closed contact sensor.
    Sensor {
        /// Whether the contact is open.
        open: bool,
    },
    /// Switched relay output.
    Relay {
        /// Whether the relay is energized.
        on: bool,
    },
    /// Any state shape not modeled above, kept as raw JSON.
    Other(Value),
}

impl DeviceState {
    /// Interpret an opaque payload as a device state.
    ///
    /// Never fails: unknown shapes land in [`DeviceState::Other`].
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or(DeviceState::Other(value))
    }

    /// Look up a named field of the state, as raw JSON.
    ///
    /// Used by solve-condition evaluation; unknown keys yield `None`.
    pub fn field(&self, key: &str) -> Option<Value> {
        match self {
            DeviceState::Maglock { locked, power } => match key {
                "locked" => Some(Value::Bool(*locked)),
                "power" => serde_json::Number::from_f64(*power).map(Value::Number),
                _ => None,
            },
            DeviceState::Button { pressed } => (key == "pressed").then_some(Value::Bool(*pressed)),
            DeviceState::Sensor { open } => (key == "open").then_some(Value::Bool(*open)),
            DeviceState::Relay { on } => (key == "on").then_some(Value::Bool(*on)),
            DeviceState::Other(value) => value.get(key).cloned(),
        }
    }
}

/// Latest known state for one device, plus the origin time of the event that
/// produced it.
///
/// Snapshots are overwritten whole on every newer `device_state_changed` for
/// the same key; they are never merged partially, and each one is owned
/// exclusively by the session tracking it.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStateSnapshot {
    /// The reported state payload.
    pub state: DeviceState,
    /// Origin timestamp of the producing event.
    pub updated_at: OffsetDateTime,
}

/// Map of device snapshots visible to one session.
pub type DeviceStates = HashMap<DeviceKey, DeviceStateSnapshot>;
