//! Application-level configuration loading, including the static room set.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::puzzle::RoomDefinition;

/// Default location on disk where the service looks for room definitions.
const DEFAULT_ROOMS_PATH: &str = "config/rooms.json";
/// Environment variable that overrides [`DEFAULT_ROOMS_PATH`].
const ROOMS_PATH_ENV: &str = "WARDEN_ROOMS_PATH";
/// Environment variable carrying the hardware broker URL.
const MQTT_URL_ENV: &str = "WARDEN_MQTT_URL";
/// Environment variable carrying the registry base URL.
const REGISTRY_URL_ENV: &str = "WARDEN_REGISTRY_URL";
/// Environment variable carrying the shared registration token.
const INTERNAL_TOKEN_ENV: &str = "WARDEN_INTERNAL_TOKEN";

/// Error raised while assembling the runtime configuration.
///
/// Every variant is fatal: the process must exit before accepting any
/// connection when its configuration is unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The shared registration token is absent from the environment.
    #[error("{INTERNAL_TOKEN_ENV} is not set; refusing to start without registry credentials")]
    MissingToken,
    /// The hardware broker URL cannot be parsed into host and port.
    #[error("invalid MQTT broker URL `{0}`")]
    InvalidMqttUrl(String),
}

/// Host/port pair extracted from the configured broker URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttEndpoint {
    /// Broker hostname or address.
    pub host: String,
    /// Broker TCP port.
    pub port: u16,
}

impl MqttEndpoint {
    /// Parse `mqtt://host[:port]` (or `tcp://`, or a bare `host[:port]`).
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let trimmed = url
            .strip_prefix("mqtt://")
            .or_else(|| url.strip_prefix("tcp://"))
            .unwrap_or(url);

        let (host, port) = match trimmed.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidMqttUrl(url.to_string()))?;
                (host, port)
            }
            None => (trimmed, 1883),
        };

        if host.is_empty() || host.contains('/') {
            return Err(ConfigError::InvalidMqttUrl(url.to_string()));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Hardware broker endpoint.
    pub mqtt: MqttEndpoint,
    /// Base URL of the external registry service.
    pub registry_url: String,
    /// Shared token authenticating registration forwards.
    pub internal_token: String,
    /// TCP port the control API listens on.
    pub port: u16,
    /// Static room and puzzle definitions.
    pub rooms: Vec<RoomDefinition>,
}

impl AppConfig {
    /// Assemble the configuration from the environment and the rooms file.
    ///
    /// A missing registration token is a fatal startup condition; a missing
    /// or unreadable rooms file only degrades the service to an empty room
    /// set with a warning.
    pub fn from_env() -> Result<Self, ConfigError> {
        let internal_token = env::var(INTERNAL_TOKEN_ENV)
            .ok()
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let mqtt_url =
            env::var(MQTT_URL_ENV).unwrap_or_else(|_| "mqtt://localhost:1883".to_string());
        let mqtt = MqttEndpoint::parse(&mqtt_url)?;

        let registry_url =
            env::var(REGISTRY_URL_ENV).unwrap_or_else(|_| "http://localhost:3000".to_string());

        let port = env::var("PORT")
            .or_else(|_| env::var("SERVER_PORT"))
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8080);

        Ok(Self {
            mqtt,
            registry_url,
            internal_token,
            port,
            rooms: load_rooms(),
        })
    }
}

/// JSON representation of the rooms file.
#[derive(Debug, Deserialize)]
struct RawRooms {
    rooms: Vec<RoomDefinition>,
}

/// Load room definitions from disk, falling back to an empty set.
fn load_rooms() -> Vec<RoomDefinition> {
    let path = resolve_rooms_path();
    match fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<RawRooms>(&contents) {
            Ok(raw) => {
                info!(
                    path = %path.display(),
                    count = raw.rooms.len(),
                    "loaded room definitions"
                );
                raw.rooms
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to parse rooms file; starting with no rooms"
                );
                Vec::new()
            }
        },
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!(
                path = %path.display(),
                "rooms file not found; starting with no rooms"
            );
            Vec::new()
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "failed to read rooms file; starting with no rooms"
            );
            Vec::new()
        }
    }
}

/// Resolve the rooms file path taking the environment override into account.
fn resolve_rooms_path() -> PathBuf {
    env::var_os(ROOMS_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOMS_PATH))
}
