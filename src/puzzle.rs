//! Static puzzle definitions and the pure solve-condition evaluator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{DeviceKey, DeviceStates};

/// Declarative rule deciding when a puzzle counts as solved.
///
/// Conditions are evaluated against the device-state snapshots visible to
/// the owning room; a reference to a device or field with no snapshot yet
/// evaluates to `false`, never to an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveCondition {
    /// A named field of one device's latest state equals a literal value.
    DeviceMatches {
        /// Controller the device is wired to.
        controller_id: String,
        /// Device whose state is inspected.
        device_id: String,
        /// State field compared against `equals`.
        key: String,
        /// Expected field value.
        equals: Value,
    },
    /// Every sub-condition holds; vacuously true when empty.
    AllOf {
        /// Sub-conditions, all of which must hold.
        conditions: Vec<SolveCondition>,
    },
    /// At least one sub-condition holds; false when empty.
    AnyOf {
        /// Sub-conditions, any one of which suffices.
        conditions: Vec<SolveCondition>,
    },
}

impl SolveCondition {
    /// Whether this condition inspects the given device at any depth.
    pub fn references(&self, key: &DeviceKey) -> bool {
        match self {
            SolveCondition::DeviceMatches {
                controller_id,
                device_id,
                ..
            } => controller_id == &key.controller_id && device_id == &key.device_id,
            SolveCondition::AllOf { conditions } | SolveCondition::AnyOf { conditions } => {
                conditions.iter().any(|condition| condition.references(key))
            }
        }
    }
}

/// Static definition of one puzzle within a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PuzzleDefinition {
    /// Stable identifier of the puzzle.
    pub puzzle_id: String,
    /// Display name shown to game masters.
    pub name: String,
    /// Rule deciding when the puzzle is solved.
    pub solve_condition: SolveCondition,
}

/// Static definition of one room and its puzzles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDefinition {
    /// Stable identifier of the room.
    pub room_id: String,
    /// Display name of the room.
    pub name: String,
    /// Puzzles that must all be solved to complete the room, in order.
    pub puzzles: Vec<PuzzleDefinition>,
}

/// Evaluate a solve condition against the latest device snapshots.
///
/// Deterministic and side-effect free: re-evaluating the same inputs always
/// yields the same answer, so it is safe to run on every incoming event.
pub fn evaluate(condition: &SolveCondition, states: &DeviceStates) -> bool {
    match condition {
        SolveCondition::DeviceMatches {
            controller_id,
            device_id,
            key,
            equals,
        } => {
            let device = DeviceKey::new(controller_id.clone(), device_id.clone());
            states
                .get(&device)
                .and_then(|snapshot| snapshot.state.field(key))
                .is_some_and(|actual| &actual == equals)
        }
        SolveCondition::AllOf { conditions } => {
            conditions.iter().all(|condition| evaluate(condition, states))
        }
        SolveCondition::AnyOf { conditions } => {
            conditions.iter().any(|condition| evaluate(condition, states))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use crate::domain::{DeviceState, DeviceStateSnapshot};

    use super::*;

    fn states_with(entries: &[(&str, &str, DeviceState)]) -> DeviceStates {
        entries
            .iter()
            .map(|(controller_id, device_id, state)| {
                (
                    DeviceKey::new(*controller_id, *device_id),
                    DeviceStateSnapshot {
                        state: state.clone(),
                        updated_at: datetime!(2024-01-01 00:00:00 UTC),
                    },
                )
            })
            .collect()
    }

    fn door_open() -> SolveCondition {
        SolveCondition::DeviceMatches {
            controller_id: "ctrl_1".into(),
            device_id: "door_sensor".into(),
            key: "open".into(),
            equals: json!(true),
        }
    }

    #[test]
    fn matching_field_satisfies_condition() {
        let states = states_with(&[("ctrl_1", "door_sensor", DeviceState::Sensor { open: true })]);
        assert!(evaluate(&door_open(), &states));
    }

    #[test]
    fn mismatching_field_fails_condition() {
        let states = states_with(&[("ctrl_1", "door_sensor", DeviceState::Sensor { open: false })]);
        assert!(!evaluate(&door_open(), &states));
    }

    #[test]
    fn missing_device_evaluates_false_without_panicking() {
        assert!(!evaluate(&door_open(), &DeviceStates::new()));
    }

    #[test]
    fn missing_field_evaluates_false() {
        let states = states_with(&[("ctrl_1", "door_sensor", DeviceState::Button { pressed: true })]);
        assert!(!evaluate(&door_open(), &states));
    }

    #[test]
    fn all_of_requires_every_branch() {
        let button = SolveCondition::DeviceMatches {
            controller_id: "ctrl_1".into(),
            device_id: "red_button".into(),
            key: "pressed".into(),
            equals: json!(true),
        };
        let both = SolveCondition::AllOf {
            conditions: vec![door_open(), button],
        };

        let one_down = states_with(&[
            ("ctrl_1", "door_sensor", DeviceState::Sensor { open: true }),
            ("ctrl_1", "red_button", DeviceState::Button { pressed: false }),
        ]);
        assert!(!evaluate(&both, &one_down));

        let both_up = states_with(&[
            ("ctrl_1", "door_sensor", DeviceState::Sensor { open: true }),
            ("ctrl_1", "red_button", DeviceState::Button { pressed: true }),
        ]);
        assert!(evaluate(&both, &both_up));
    }

    #[test]
    fn empty_combinators_have_fixed_truth_values() {
        let states = DeviceStates::new();
        assert!(evaluate(&SolveCondition::AllOf { conditions: vec![] }, &states));
        assert!(!evaluate(&SolveCondition::AnyOf { conditions: vec![] }, &states));
    }

    #[test]
    fn references_recurses_through_combinators() {
        let nested = SolveCondition::AnyOf {
            conditions: vec![SolveCondition::AllOf {
                conditions: vec![door_open()],
            }],
        };
        assert!(nested.references(&DeviceKey::new("ctrl_1", "door_sensor")));
        assert!(!nested.references(&DeviceKey::new("ctrl_1", "red_button")));
    }

    #[test]
    fn conditions_load_from_config_json() {
        let raw = json!({
            "all_of": {
                "conditions": [
                    {"device_matches": {
                        "controller_id": "ctrl_1",
                        "device_id": "door_sensor",
                        "key": "open",
                        "equals": true
                    }}
                ]
            }
        });
        let condition: SolveCondition = serde_json::from_value(raw).unwrap();
        assert!(condition.references(&DeviceKey::new("ctrl_1", "door_sensor")));
    }
}
