//! Codec for the hierarchical hardware topic namespace.
//!
//! Controllers publish telemetry under
//! `warden/room/{room_id}/controller/{controller_id}/...` and announce
//! themselves on two fixed registration topics. Decoding is positional: a
//! topic either matches one of the known shapes exactly or is rejected.

use thiserror::Error;

/// Root segment shared by every topic this service consumes.
pub const TOPIC_PREFIX: &str = "warden";

/// Well-known topic on which controllers announce themselves.
pub const REGISTER_CONTROLLER_TOPIC: &str = "warden/system/register/controller";
/// Well-known topic on which devices announce themselves.
pub const REGISTER_DEVICE_TOPIC: &str = "warden/system/register/device";

/// Telemetry sub-category of a hardware topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Per-device state reports.
    State,
    /// Controller keep-alive beacons.
    Heartbeat,
    /// Controller online/offline announcements.
    Status,
}

/// Hardware origin of a telemetry message, derived from its topic.
///
/// `device_id` is present exactly when `channel` is [`Channel::State`];
/// heartbeat and status topics are controller-scoped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Room the controller is installed in.
    pub room_id: String,
    /// Controller that produced the message.
    pub controller_id: String,
    /// Device the message refers to, for state topics.
    pub device_id: Option<String>,
    /// Telemetry channel the topic belongs to.
    pub channel: Channel,
}

/// Outcome of classifying a raw topic before any payload inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicKind {
    /// Controller self-registration message.
    RegisterController,
    /// Device self-registration message.
    RegisterDevice,
    /// Telemetry message with a decodable [`Address`].
    Telemetry(Address),
}

/// Error returned when a topic does not match any known shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedTopicError {
    /// The topic does not start with the expected root/`room` segments.
    #[error("topic `{0}` is outside the `{TOPIC_PREFIX}/room` namespace")]
    UnknownNamespace(String),
    /// The topic has the wrong number of segments for its channel.
    #[error("topic `{0}` has an unexpected segment count")]
    SegmentCount(String),
    /// The trailing channel segment is not state/heartbeat/status.
    #[error("topic `{0}` ends in an unknown channel segment")]
    UnknownChannel(String),
    /// A positional identifier segment is empty.
    #[error("topic `{0}` contains an empty identifier segment")]
    EmptySegment(String),
}

/// Classify a raw topic into registration vs. telemetry.
///
/// Registration topics are fixed strings and carry no [`Address`]; anything
/// else must decode positionally or the whole message is rejected.
pub fn classify(topic: &str) -> Result<TopicKind, MalformedTopicError> {
    match topic {
        REGISTER_CONTROLLER_TOPIC => Ok(TopicKind::RegisterController),
        REGISTER_DEVICE_TOPIC => Ok(TopicKind::RegisterDevice),
        other => Address::decode(other).map(TopicKind::Telemetry),
    }
}

/// Subscription patterns covering every topic the gateway consumes.
///
/// The `+` wildcards exist only here, at subscription time; encoding a
/// concrete [`Address`] never produces them.
pub fn subscription_patterns() -> [&'static str; 5] {
    [
        REGISTER_CONTROLLER_TOPIC,
        REGISTER_DEVICE_TOPIC,
        "warden/room/+/controller/+/device/+/state",
        "warden/room/+/controller/+/heartbeat",
        "warden/room/+/controller/+/status",
    ]
}

impl Address {
    /// Build a state-channel address for a concrete device.
    pub fn state(room_id: impl Into<String>, controller_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            controller_id: controller_id.into(),
            device_id: Some(device_id.into()),
            channel: Channel::State,
        }
    }

    /// Build a heartbeat-channel address for a controller.
    pub fn heartbeat(room_id: impl Into<String>, controller_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            controller_id: controller_id.into(),
            device_id: None,
            channel: Channel::Heartbeat,
        }
    }

    /// Build a status-channel address for a controller.
    pub fn status(room_id: impl Into<String>, controller_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            controller_id: controller_id.into(),
            device_id: None,
            channel: Channel::Status,
        }
    }

    /// Decode a telemetry topic into its address by positional extraction.
    pub fn decode(topic: &str) -> Result<Self, MalformedTopicError> {
        let segments: Vec<&str> = topic.split('/').collect();

        if segments.len() < 4 || segments[0] != TOPIC_PREFIX || segments[1] != "room" || segments[3] != "controller" {
            return Err(MalformedTopicError::UnknownNamespace(topic.to_string()));
        }

        let (device_id, channel) = match segments.len() {
            6 => match segments[5] {
                "heartbeat" => (None, Channel::Heartbeat),
                "status" => (None, Channel::Status),
                _ => return Err(MalformedTopicError::UnknownChannel(topic.to_string())),
            },
            8 if segments[5] == "device" => match segments[7] {
                "state" => (Some(segments[6]), Channel::State),
                _ => return Err(MalformedTopicError::UnknownChannel(topic.to_string())),
            },
            _ => return Err(MalformedTopicError::SegmentCount(topic.to_string())),
        };

        let room_id = segments[2];
        let controller_id = segments[4];
        if room_id.is_empty() || controller_id.is_empty() || device_id.is_some_and(str::is_empty) {
            return Err(MalformedTopicError::EmptySegment(topic.to_string()));
        }

        Ok(Self {
            room_id: room_id.to_string(),
            controller_id: controller_id.to_string(),
            device_id: device_id.map(str::to_string),
            channel,
        })
    }

    /// Encode this address back into its topic string.
    ///
    /// Total inverse of [`Address::decode`] for well-formed addresses.
    pub fn topic(&self) -> String {
        match self.channel {
            Channel::State => {
                // State addresses built through the constructors or the
                // decoder always carry a device id.
                let device_id = self.device_id.as_deref().unwrap_or_default();
                format!(
                    "{TOPIC_PREFIX}/room/{}/controller/{}/device/{device_id}/state",
                    self.room_id, self.controller_id
                )
            }
            Channel::Heartbeat => format!(
                "{TOPIC_PREFIX}/room/{}/controller/{}/heartbeat",
                self.room_id, self.controller_id
            ),
            Channel::Status => format!(
                "{TOPIC_PREFIX}/room/{}/controller/{}/status",
                self.room_id, self.controller_id
            ),
        }
    }
}
