//! Shared application state wiring the bus, sessions, and liveness together.

pub mod liveness;
pub mod repository;
pub mod session;

use std::{collections::HashMap, sync::Arc};

use tokio::sync::watch;

use crate::{bus::EventHub, config::AppConfig, puzzle::RoomDefinition};

use self::{liveness::LivenessTracker, repository::SessionRepository};

/// Cheaply clonable handle to the shared application state.
pub type SharedState = Arc<AppState>;

/// Central application state handed to every component at startup.
///
/// Explicitly constructed and dependency-injected: there is no ambient
/// global; the gateway, orchestrator, and control plane all receive this
/// handle from `main`.
pub struct AppState {
    config: AppConfig,
    rooms: HashMap<String, RoomDefinition>,
    events: EventHub,
    sessions: SessionRepository,
    liveness: LivenessTracker,
    connected: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned
    /// cheaply.
    ///
    /// The hardware transport starts disconnected until its supervisor
    /// reports the first successful connection.
    pub fn new(config: AppConfig) -> SharedState {
        let (connected_tx, _rx) = watch::channel(false);
        let rooms = config
            .rooms
            .iter()
            .cloned()
            .map(|room| (room.room_id.clone(), room))
            .collect();

        Arc::new(Self {
            config,
            rooms,
            events: EventHub::default(),
            sessions: SessionRepository::new(),
            liveness: LivenessTracker::new(),
            connected: connected_tx,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Static definition for a room, when one is configured.
    pub fn room(&self, room_id: &str) -> Option<&RoomDefinition> {
        self.rooms.get(room_id)
    }

    /// Hub carrying the domain-events channel.
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Repository of active and finished game sessions.
    pub fn sessions(&self) -> &SessionRepository {
        &self.sessions
    }

    /// Controller liveness bookkeeping.
    pub fn liveness(&self) -> &LivenessTracker {
        &self.liveness
    }

    /// Whether the hardware transport currently holds a broker connection.
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Update the transport connection signal when the value changes.
    pub fn set_connected(&self, value: bool) {
        self.connected.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Subscribe to transport connection-state updates.
    pub fn connection_watcher(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }
}
