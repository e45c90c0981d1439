//! In-memory store of game sessions, keyed by session and by room.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::state::session::GameSession;

/// Handle to a stored session.
///
/// The mutex doubles as the per-room mutual-exclusion boundary required for
/// session mutation: at most one session is active per room, so serializing
/// on the session serializes the room. Both the control plane and the
/// orchestrator take this lock before touching session state.
pub type SessionHandle = Arc<Mutex<GameSession>>;

/// Error raised at the repository boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The room already has a running or paused session.
    #[error("room `{0}` already has an active session")]
    RoomBusy(String),
    /// No session is stored under the given identifier.
    #[error("session `{0}` not found")]
    NotFound(Uuid),
}

/// In-memory repository of sessions.
///
/// Finished sessions are evicted from the active-per-room index so a new
/// game can start, but stay readable by id until the process exits.
#[derive(Default)]
pub struct SessionRepository {
    sessions: DashMap<Uuid, SessionHandle>,
    active_by_room: DashMap<String, Uuid>,
}

impl SessionRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly started session and claim its room.
    ///
    /// Rejects with [`SessionError::RoomBusy`] when the room already has an
    /// active session; the existing session is left untouched. The check and
    /// the claim are a single atomic entry operation, so two concurrent start
    /// requests cannot both win.
    pub fn create(&self, session: GameSession) -> Result<SessionHandle, SessionError> {
        let session_id = session.session_id;
        let room_id = session.room_id.clone();

        match self.active_by_room.entry(room_id.clone()) {
            Entry::Occupied(_) => Err(SessionError::RoomBusy(room_id)),
            Entry::Vacant(slot) => {
                let handle: SessionHandle = Arc::new(Mutex::new(session));
                self.sessions.insert(session_id, handle.clone());
                slot.insert(session_id);
                Ok(handle)
            }
        }
    }

    /// Look up a session by its identifier.
    pub fn get(&self, session_id: Uuid) -> Result<SessionHandle, SessionError> {
        self.sessions
            .get(&session_id)
            .map(|entry| entry.value().clone())
            .ok_or(SessionError::NotFound(session_id))
    }

    /// Look up the active session for a room, if any.
    pub fn active_for_room(&self, room_id: &str) -> Option<SessionHandle> {
        let session_id = *self.active_by_room.get(room_id)?;
        self.sessions
            .get(&session_id)
            .map(|entry| entry.value().clone())
    }

    /// Number of rooms currently occupied by an active session.
    pub fn active_count(&self) -> usize {
        self.active_by_room.len()
    }

    /// Snapshot every stored session handle.
    pub fn list(&self) -> Vec<SessionHandle> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Release a room claimed by a session that reached a terminal status.
    ///
    /// The session id guard keeps a stale release (from an already-replaced
    /// session) from evicting the room's current occupant.
    pub fn release_room(&self, room_id: &str, session_id: Uuid) {
        self.active_by_room
            .remove_if(room_id, |_, active| *active == session_id);
    }
}
