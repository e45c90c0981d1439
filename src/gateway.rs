//! Ingestion gateway normalizing raw hardware messages into domain events.

use serde_json::{Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    domain::{DomainEvent, EventType, SOURCE_GATEWAY},
    registry::RegistryClient,
    state::SharedState,
    topic::{self, Address, Channel, TopicKind},
    transport::RawMessage,
};

/// Which registry endpoint a registration message targets.
#[derive(Debug, Clone, Copy)]
enum RegistrationKind {
    Controller,
    Device,
}

impl RegistrationKind {
    fn label(&self) -> &'static str {
        match self {
            RegistrationKind::Controller => "controller",
            RegistrationKind::Device => "device",
        }
    }
}

/// Gateway between the hardware bus and the domain-events channel.
///
/// Decode and mapping failures never propagate past this component: a
/// message that cannot be decoded is logged and dropped, because the
/// producer is responsible for well-formed messages and telemetry recurs on
/// the hardware's own schedule. The only side effects are the registry
/// forward and the bus publish.
pub struct IngestionGateway {
    state: SharedState,
    registry: RegistryClient,
}

impl IngestionGateway {
    /// Build a gateway over the shared state and a registry client.
    pub fn new(state: SharedState, registry: RegistryClient) -> Self {
        Self { state, registry }
    }

    /// Consume raw messages until the transport side closes the channel.
    pub async fn run(self, mut raw_rx: mpsc::Receiver<RawMessage>) {
        info!("ingestion gateway ready");
        while let Some(message) = raw_rx.recv().await {
            self.handle(message).await;
        }
        info!("hardware message stream ended; ingestion gateway stopping");
    }

    /// Process one raw hardware message.
    pub async fn handle(&self, message: RawMessage) {
        match topic::classify(&message.topic) {
            Ok(TopicKind::RegisterController) => {
                self.forward_registration(RegistrationKind::Controller, &message.payload)
                    .await;
            }
            Ok(TopicKind::RegisterDevice) => {
                self.forward_registration(RegistrationKind::Device, &message.payload)
                    .await;
            }
            Ok(TopicKind::Telemetry(address)) => {
                let received_at = OffsetDateTime::now_utc();
                if let Some(event) =
                    normalize(&address, &message.topic, &message.payload, received_at)
                {
                    debug!(
                        kind = event.kind.as_str(),
                        room_id = %event.room_id,
                        "publishing normalized domain event"
                    );
                    self.state.events().publish(event);
                }
            }
            Err(err) => {
                warn!(topic = %message.topic, error = %err, "dropping message with undecodable topic");
            }
        }
    }

    /// Forward a registration announcement to the registry service.
    ///
    /// Failures are logged and the message dropped: registration is retried
    /// by the hardware on its own schedule, never by the gateway.
    async fn forward_registration(&self, kind: RegistrationKind, raw: &[u8]) {
        let payload: Value = match serde_json::from_slice(raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    kind = kind.label(),
                    error = %err,
                    "dropping registration with unparseable payload"
                );
                return;
            }
        };

        let result = match kind {
            RegistrationKind::Controller => self.registry.register_controller(&payload).await,
            RegistrationKind::Device => self.registry.register_device(&payload).await,
        };

        match result {
            Ok(()) => info!(
                kind = kind.label(),
                controller_id = payload.get("controller_id").and_then(serde_json::Value::as_str),
                device_id = payload.get("device_id").and_then(serde_json::Value::as_str),
                "registration forwarded"
            ),
            Err(err) => warn!(
                kind = kind.label(),
                error = %err,
                "registration forward failed; hardware will retry"
            ),
        }
    }
}

/// Map a decoded telemetry message into a domain event.
///
/// Returns `None` (after logging) for payloads that are not valid JSON or
/// state reports missing their `state` field. The event timestamp prefers a
/// parseable `timestamp` in the payload and falls back to receipt time.
fn normalize(
    address: &Address,
    origin_topic: &str,
    raw: &[u8],
    received_at: OffsetDateTime,
) -> Option<DomainEvent> {
    let payload: Value = match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(topic = origin_topic, error = %err, "dropping telemetry with unparseable payload");
            return None;
        }
    };

    let timestamp = payload_timestamp(&payload).unwrap_or(received_at);

    let (kind, event_payload) = match address.channel {
        Channel::State => {
            let Some(new_state) = payload.get("state").cloned() else {
                warn!(topic = origin_topic, "dropping state report without a `state` field");
                return None;
            };
            (
                EventType::DeviceStateChanged,
                json!({ "new_state": new_state, "raw": payload }),
            )
        }
        Channel::Heartbeat => (EventType::ControllerHeartbeat, payload),
        Channel::Status => {
            let kind = if indicates_online(&payload) {
                EventType::ControllerOnline
            } else {
                EventType::ControllerOffline
            };
            (kind, payload)
        }
    };

    Some(
        DomainEvent::new(kind, address.room_id.clone(), event_payload, timestamp, SOURCE_GATEWAY)
            .with_origin(Some(address.controller_id.clone()), address.device_id.clone())
            .with_metadata("origin_topic", Value::String(origin_topic.to_string())),
    )
}

/// Extract a parseable RFC 3339 `timestamp` from a telemetry payload.
fn payload_timestamp(payload: &Value) -> Option<OffsetDateTime> {
    let raw = payload.get("timestamp")?.as_str()?;
    OffsetDateTime::parse(raw, &Rfc3339).ok()
}

/// Whether a status payload announces the controller as online.
fn indicates_online(payload: &Value) -> bool {
    payload.get("online").and_then(Value::as_bool) == Some(true)
        || payload.get("status").and_then(Value::as_str) == Some("online")
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::state::test_support::state_with_room;

    use super::*;

    const RECEIPT: OffsetDateTime = datetime!(2024-06-01 12:00:00 UTC);

    fn normalize_state(payload: &str) -> Option<DomainEvent> {
        let address = Address::state("room_demo", "ctrl_1", "door_sensor");
        normalize(&address, &address.topic(), payload.as_bytes(), RECEIPT)
    }

    #[test]
    fn state_report_maps_to_exactly_one_device_state_changed() {
        let event = normalize_state(
            r#"{"v":1,"type":"device_state","controller_id":"ctrl_1","device_id":"door_sensor","state":{"open":true},"timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(event.kind, EventType::DeviceStateChanged);
        assert_eq!(event.room_id, "room_demo");
        assert_eq!(event.controller_id.as_deref(), Some("ctrl_1"));
        assert_eq!(event.device_id.as_deref(), Some("door_sensor"));
        assert_eq!(event.payload["new_state"]["open"], json!(true));
        assert_eq!(event.payload["raw"]["v"], json!(1));
        assert_eq!(event.timestamp, datetime!(2024-01-01 00:00:00 UTC));
        assert_eq!(event.metadata["source"], json!(SOURCE_GATEWAY));
        assert_eq!(
            event.metadata["origin_topic"],
            json!("warden/room/room_demo/controller/ctrl_1/device/door_sensor/state")
        );
    }

    #[test]
    fn missing_or_invalid_timestamp_falls_back_to_receipt_time() {
        let missing = normalize_state(r#"{"state":{"open":true}}"#).unwrap();
        assert_eq!(missing.timestamp, RECEIPT);

        let invalid = normalize_state(r#"{"state":{"open":true},"timestamp":"yesterday"}"#).unwrap();
        assert_eq!(invalid.timestamp, RECEIPT);
    }

    #[test]
    fn state_report_without_state_field_is_dropped() {
        assert!(normalize_state(r#"{"v":1,"type":"device_state"}"#).is_none());
    }

    #[test]
    fn unparseable_payload_is_dropped() {
        assert!(normalize_state("not json at all").is_none());
    }

    #[test]
    fn heartbeat_keeps_the_raw_payload() {
        let address = Address::heartbeat("room_demo", "ctrl_1");
        let event = normalize(
            &address,
            &address.topic(),
            br#"{"uptime_s": 120}"#,
            RECEIPT,
        )
        .unwrap();

        assert_eq!(event.kind, EventType::ControllerHeartbeat);
        assert_eq!(event.device_id, None);
        assert_eq!(event.payload, json!({"uptime_s": 120}));
    }

    #[test]
    fn status_payload_decides_online_vs_offline() {
        let address = Address::status("room_demo", "ctrl_1");
        let cases = [
            (r#"{"online": true}"#, EventType::ControllerOnline),
            (r#"{"status": "online"}"#, EventType::ControllerOnline),
            (r#"{"online": false}"#, EventType::ControllerOffline),
            (r#"{"status": "rebooting"}"#, EventType::ControllerOffline),
            (r#"{}"#, EventType::ControllerOffline),
        ];
        for (payload, expected) in cases {
            let event = normalize(&address, &address.topic(), payload.as_bytes(), RECEIPT).unwrap();
            assert_eq!(event.kind, expected, "payload: {payload}");
        }
    }

    #[tokio::test]
    async fn malformed_topic_publishes_nothing() {
        let state = state_with_room("room_demo", vec![]);
        let registry = RegistryClient::new("http://localhost:9", "test-token").unwrap();
        let gateway = IngestionGateway::new(state.clone(), registry);

        let mut receiver = state.events().subscribe();
        gateway
            .handle(RawMessage {
                // state topic with the device id segment missing entirely
                topic: "warden/room/room_demo/controller/ctrl_1/device/state".into(),
                payload: br#"{"state":{"open":true}}"#.to_vec(),
            })
            .await;

        assert!(matches!(
            receiver.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn well_formed_state_message_reaches_the_bus() {
        let state = state_with_room("room_demo", vec![]);
        let registry = RegistryClient::new("http://localhost:9", "test-token").unwrap();
        let gateway = IngestionGateway::new(state.clone(), registry);

        let mut receiver = state.events().subscribe();
        gateway
            .handle(RawMessage {
                topic: "warden/room/room_demo/controller/ctrl_1/device/door_sensor/state".into(),
                payload: br#"{"state":{"open":true},"timestamp":"2024-01-01T00:00:00Z"}"#.to_vec(),
            })
            .await;

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.kind, EventType::DeviceStateChanged);
        assert_eq!(event.payload["new_state"]["open"], json!(true));
    }
}
