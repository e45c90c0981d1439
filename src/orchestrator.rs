//! Orchestrator consuming normalized domain events and advancing sessions.

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::{
    domain::{DeviceKey, DeviceState, DeviceStateSnapshot, DomainEvent, EventType, SOURCE_ORCHESTRATOR},
    puzzle,
    services::bus_events,
    state::{
        SharedState,
        session::{SessionStatus, SessionTransition},
    },
};

/// Where an event is routed before any session logic runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The event drives gameplay and may mutate a session.
    Gameplay,
    /// The event only feeds controller liveness bookkeeping.
    Liveness,
    /// Housekeeping the orchestrator does not consume.
    Skip,
}

/// Pure dispatch filter in front of the orchestrator.
///
/// Only gameplay-relevant event types reach the session-mutating path;
/// everything else is short-circuited here.
pub struct DeviceEventHandler;

impl DeviceEventHandler {
    /// Decide where an event kind is routed.
    pub fn route(kind: EventType) -> Route {
        match kind {
            EventType::DeviceStateChanged | EventType::EmergencyStopTriggered => Route::Gameplay,
            EventType::ControllerHeartbeat
            | EventType::ControllerOnline
            | EventType::ControllerOffline => Route::Liveness,
            EventType::SessionStarted
            | EventType::SessionPaused
            | EventType::SessionResumed
            | EventType::SessionHalted
            | EventType::PuzzleSolved
            | EventType::SceneAdvanced => Route::Skip,
        }
    }
}

/// Transition function of the per-room game-session state machine.
///
/// Runs as a single worker over one bus subscription, so events are applied
/// in receipt order; per-room mutation is additionally serialized behind the
/// session mutex shared with the control plane. Handling is idempotent under
/// at-least-once delivery: snapshots are last-write-wins, solving is
/// monotonic, and the terminal transitions fire at most once.
pub struct Orchestrator {
    state: SharedState,
}

impl Orchestrator {
    /// Build an orchestrator over the shared state.
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Consume the domain-event stream until the hub shuts down.
    pub async fn run(self) {
        let mut receiver = self.state.events().subscribe();
        info!("orchestrator subscribed to domain events");

        loop {
            match receiver.recv().await {
                Ok(event) => self.dispatch(event).await,
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => {
                    // Gaps are tolerated; the next telemetry report restores
                    // the snapshot state.
                    warn!(skipped, "orchestrator lagged behind the domain-event stream");
                }
            }
        }

        info!("domain-event stream closed; orchestrator stopping");
    }

    /// Route one event through the handler filter.
    pub async fn dispatch(&self, event: DomainEvent) {
        match DeviceEventHandler::route(event.kind) {
            Route::Gameplay => self.apply_gameplay(event).await,
            Route::Liveness => self.track_liveness(&event),
            Route::Skip => {}
        }
    }

    async fn apply_gameplay(&self, event: DomainEvent) {
        match event.kind {
            EventType::DeviceStateChanged => self.apply_device_state(event).await,
            EventType::EmergencyStopTriggered => self.apply_emergency_stop(event).await,
            _ => {}
        }
    }

    /// Apply a device-state report to the owning session.
    async fn apply_device_state(&self, event: DomainEvent) {
        let Some(handle) = self.state.sessions().active_for_room(&event.room_id) else {
            // Expected steady-state whenever no game is in progress.
            debug!(room_id = %event.room_id, "device event for a room with no active session");
            return;
        };

        let (Some(controller_id), Some(device_id)) =
            (event.controller_id.clone(), event.device_id.clone())
        else {
            warn!(event_id = %event.event_id, "device-state event without a hardware origin");
            return;
        };
        let Some(new_state) = event.payload.get("new_state").cloned() else {
            warn!(event_id = %event.event_id, "device-state event without a `new_state` payload");
            return;
        };

        let key = DeviceKey::new(controller_id, device_id);
        let mut session = handle.lock().await;

        // The snapshot is replaced whole even when the session is paused or
        // the device drives no puzzle; evaluation below is what gates on
        // status and references.
        session.record_snapshot(
            key.clone(),
            DeviceStateSnapshot {
                state: DeviceState::from_value(new_state),
                updated_at: event.timestamp,
            },
        );

        if session.status() != SessionStatus::Running {
            return;
        }
        let Some(room) = self.state.room(&event.room_id) else {
            debug!(room_id = %event.room_id, "no static definition for room; skipping evaluation");
            return;
        };

        let mut newly_solved = false;
        for puzzle in &room.puzzles {
            if session.is_solved(&puzzle.puzzle_id) || !puzzle.solve_condition.references(&key) {
                continue;
            }
            if puzzle::evaluate(&puzzle.solve_condition, session.device_states())
                && session.mark_solved(&puzzle.puzzle_id)
            {
                newly_solved = true;
                info!(
                    room_id = %session.room_id,
                    session_id = %session.session_id,
                    puzzle_id = %puzzle.puzzle_id,
                    "puzzle solved"
                );
                bus_events::publish_puzzle_solved(&self.state, &session, puzzle);
            }
        }

        // Completion can only become true on an event that just solved
        // something, which keeps a redelivered event from re-completing.
        if newly_solved && session.all_solved() {
            match session.apply(SessionTransition::Complete) {
                Ok(_) => {
                    info!(
                        room_id = %session.room_id,
                        session_id = %session.session_id,
                        "all puzzles solved; session completed"
                    );
                    self.state
                        .sessions()
                        .release_room(&session.room_id, session.session_id);
                    bus_events::publish_scene_advanced(&self.state, &session);
                }
                Err(err) => warn!(error = %err, "completion transition rejected"),
            }
        }
    }

    /// Halt the room's session unconditionally and terminally.
    async fn apply_emergency_stop(&self, event: DomainEvent) {
        let Some(handle) = self.state.sessions().active_for_room(&event.room_id) else {
            debug!(room_id = %event.room_id, "emergency stop for a room with no active session");
            return;
        };

        let mut session = handle.lock().await;
        session.halt();
        self.state
            .sessions()
            .release_room(&session.room_id, session.session_id);
        warn!(
            room_id = %session.room_id,
            session_id = %session.session_id,
            "emergency stop: session halted"
        );
        bus_events::publish_session_halted(&self.state, &session, "emergency_stop", SOURCE_ORCHESTRATOR);
    }

    /// Update controller liveness bookkeeping; never touches session status.
    fn track_liveness(&self, event: &DomainEvent) {
        let Some(controller_id) = event.controller_id.as_deref() else {
            return;
        };
        let liveness = self.state.liveness();
        match event.kind {
            EventType::ControllerHeartbeat => {
                liveness.record_heartbeat(controller_id, &event.room_id, event.timestamp);
            }
            EventType::ControllerOnline => {
                liveness.mark_online(controller_id, &event.room_id, event.timestamp);
            }
            EventType::ControllerOffline => {
                liveness.mark_offline(controller_id, &event.room_id, event.timestamp);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::OffsetDateTime;
    use tokio::sync::broadcast::{self, error::TryRecvError};

    use crate::{
        domain::{DeviceState, SOURCE_GATEWAY},
        puzzle::PuzzleDefinition,
        state::{
            SharedState,
            liveness::ControllerStatus,
            session::GameSession,
            test_support::{flag_condition, state_with_room},
        },
    };

    use super::*;

    const ROOM: &str = "room_demo";
    const CTRL: &str = "ctrl_1";

    fn puzzle(id: &str, device_id: &str, key: &str) -> PuzzleDefinition {
        PuzzleDefinition {
            puzzle_id: id.to_string(),
            name: id.to_string(),
            solve_condition: flag_condition(CTRL, device_id, key),
        }
    }

    fn device_event(room: &str, device_id: &str, state: serde_json::Value) -> DomainEvent {
        DomainEvent::new(
            EventType::DeviceStateChanged,
            room,
            json!({ "new_state": state, "raw": {} }),
            OffsetDateTime::now_utc(),
            SOURCE_GATEWAY,
        )
        .with_origin(Some(CTRL.into()), Some(device_id.into()))
    }

    fn emergency_stop(room: &str) -> DomainEvent {
        DomainEvent::new(
            EventType::EmergencyStopTriggered,
            room,
            json!({}),
            OffsetDateTime::now_utc(),
            SOURCE_GATEWAY,
        )
    }

    /// Start a session for the configured room and return the shared state,
    /// the orchestrator, and a feed of the events it emits.
    async fn running_session(
        puzzles: Vec<PuzzleDefinition>,
    ) -> (SharedState, Orchestrator, broadcast::Receiver<DomainEvent>) {
        let state = state_with_room(ROOM, puzzles);
        let room = state.room(ROOM).unwrap();
        let session = GameSession::new(ROOM, "The Lockpickers", 4, &room.puzzles);
        state.sessions().create(session).unwrap();

        let receiver = state.events().subscribe();
        let orchestrator = Orchestrator::new(state.clone());
        (state, orchestrator, receiver)
    }

    fn drain(receiver: &mut broadcast::Receiver<DomainEvent>) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        loop {
            match receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => return events,
                Err(_) => return events,
            }
        }
    }

    #[tokio::test]
    async fn completing_every_puzzle_emits_exactly_one_scene_advanced() {
        let (state, orchestrator, mut feed) = running_session(vec![
            puzzle("open_the_door", "door_sensor", "open"),
            puzzle("press_the_button", "red_button", "pressed"),
        ])
        .await;

        orchestrator
            .dispatch(device_event(ROOM, "door_sensor", json!({"open": true})))
            .await;
        let after_first = drain(&mut feed);
        assert_eq!(after_first.len(), 1);
        assert_eq!(after_first[0].kind, EventType::PuzzleSolved);
        assert_eq!(after_first[0].payload["puzzle_id"], json!("open_the_door"));

        orchestrator
            .dispatch(device_event(ROOM, "red_button", json!({"pressed": true})))
            .await;
        let after_second = drain(&mut feed);
        let kinds: Vec<EventType> = after_second.iter().map(|event| event.kind).collect();
        assert_eq!(kinds, vec![EventType::PuzzleSolved, EventType::SceneAdvanced]);

        let handle = state.sessions().list().into_iter().next().unwrap();
        let session = handle.lock().await;
        assert_eq!(session.status(), SessionStatus::Completed);
        assert!(state.sessions().active_for_room(ROOM).is_none(), "room must be released");
    }

    #[tokio::test]
    async fn redelivered_event_leaves_session_state_unchanged() {
        // Two puzzles so the session is still running when the replay
        // arrives and actually reaches evaluation again.
        let (state, orchestrator, mut feed) = running_session(vec![
            puzzle("open_the_door", "door_sensor", "open"),
            puzzle("press_the_button", "red_button", "pressed"),
        ])
        .await;

        let event = device_event(ROOM, "door_sensor", json!({"open": true}));
        orchestrator.dispatch(event.clone()).await;
        let first_pass = drain(&mut feed);
        assert_eq!(first_pass.len(), 1);

        let snapshot_after_once = {
            let handle = state.sessions().get(first_session_id(&state).await).unwrap();
            let session = handle.lock().await;
            (session.status(), session.puzzle_states().clone())
        };

        orchestrator.dispatch(event).await;
        assert!(drain(&mut feed).is_empty(), "replay must emit nothing");

        let handle = state.sessions().get(first_session_id(&state).await).unwrap();
        let session = handle.lock().await;
        assert_eq!((session.status(), session.puzzle_states().clone()), snapshot_after_once);
    }

    async fn first_session_id(state: &SharedState) -> uuid::Uuid {
        let handle = state.sessions().list().into_iter().next().unwrap();
        let session = handle.lock().await;
        session.session_id
    }

    #[tokio::test]
    async fn emergency_stop_halts_and_freezes_puzzle_states() {
        let (state, orchestrator, mut feed) =
            running_session(vec![puzzle("open_the_door", "door_sensor", "open")]).await;

        orchestrator.dispatch(emergency_stop(ROOM)).await;
        let halted = drain(&mut feed);
        assert_eq!(halted.len(), 1);
        assert_eq!(halted[0].kind, EventType::SessionHalted);
        assert_eq!(halted[0].payload["reason"], json!("emergency_stop"));

        // The solving event arrives after the halt; the session must not
        // move and no puzzle may flip.
        orchestrator
            .dispatch(device_event(ROOM, "door_sensor", json!({"open": true})))
            .await;
        assert!(drain(&mut feed).is_empty());

        let handle = state.sessions().get(first_session_id(&state).await).unwrap();
        let session = handle.lock().await;
        assert_eq!(session.status(), SessionStatus::Halted);
        assert!(session.puzzle_states().values().all(|solved| !solved));
    }

    #[tokio::test]
    async fn events_for_rooms_without_sessions_are_consumed_quietly() {
        let state = state_with_room(ROOM, vec![]);
        let orchestrator = Orchestrator::new(state.clone());
        let mut feed = state.events().subscribe();

        orchestrator
            .dispatch(device_event("room_empty", "door_sensor", json!({"open": true})))
            .await;
        orchestrator.dispatch(emergency_stop("room_empty")).await;

        assert!(drain(&mut feed).is_empty());
    }

    #[tokio::test]
    async fn latest_received_snapshot_wins() {
        let (state, orchestrator, _feed) =
            running_session(vec![puzzle("open_the_door", "door_sensor", "open")]).await;

        // Arrival order decides, even though the "older" report arrives last
        // with an earlier embedded timestamp.
        let newer = device_event(ROOM, "unrelated", json!({"open": true}));
        let mut older = device_event(ROOM, "unrelated", json!({"open": false}));
        older.timestamp = newer.timestamp - time::Duration::minutes(5);

        orchestrator.dispatch(newer).await;
        orchestrator.dispatch(older).await;

        let handle = state.sessions().get(first_session_id(&state).await).unwrap();
        let session = handle.lock().await;
        let snapshot = session
            .device_states()
            .get(&DeviceKey::new(CTRL, "unrelated"))
            .unwrap();
        assert_eq!(snapshot.state, DeviceState::Sensor { open: false });
    }

    #[tokio::test]
    async fn unreferenced_devices_update_snapshots_without_solving() {
        let (state, orchestrator, mut feed) =
            running_session(vec![puzzle("open_the_door", "door_sensor", "open")]).await;

        orchestrator
            .dispatch(device_event(ROOM, "hallway_light", json!({"on": true})))
            .await;

        assert!(drain(&mut feed).is_empty());
        let handle = state.sessions().get(first_session_id(&state).await).unwrap();
        let session = handle.lock().await;
        assert!(session.device_states().contains_key(&DeviceKey::new(CTRL, "hallway_light")));
    }

    #[tokio::test]
    async fn paused_sessions_record_snapshots_but_do_not_solve() {
        let (state, orchestrator, mut feed) =
            running_session(vec![puzzle("open_the_door", "door_sensor", "open")]).await;

        {
            let handle = state.sessions().active_for_room(ROOM).unwrap();
            handle.lock().await.apply(SessionTransition::Pause).unwrap();
        }

        orchestrator
            .dispatch(device_event(ROOM, "door_sensor", json!({"open": true})))
            .await;

        assert!(drain(&mut feed).is_empty());
        let handle = state.sessions().active_for_room(ROOM).unwrap();
        let session = handle.lock().await;
        assert!(!session.is_solved("open_the_door"));
        assert!(session.device_states().contains_key(&DeviceKey::new(CTRL, "door_sensor")));
    }

    #[tokio::test]
    async fn liveness_events_never_touch_sessions() {
        let (state, orchestrator, mut feed) =
            running_session(vec![puzzle("open_the_door", "door_sensor", "open")]).await;

        let heartbeat = DomainEvent::new(
            EventType::ControllerHeartbeat,
            ROOM,
            json!({"uptime_s": 12}),
            OffsetDateTime::now_utc(),
            SOURCE_GATEWAY,
        )
        .with_origin(Some(CTRL.into()), None);
        orchestrator.dispatch(heartbeat).await;

        let offline = DomainEvent::new(
            EventType::ControllerOffline,
            ROOM,
            json!({"online": false}),
            OffsetDateTime::now_utc(),
            SOURCE_GATEWAY,
        )
        .with_origin(Some(CTRL.into()), None);
        orchestrator.dispatch(offline).await;

        assert!(drain(&mut feed).is_empty());
        let controllers = state.liveness().snapshot();
        assert_eq!(controllers.len(), 1);
        assert_eq!(controllers[0].status, ControllerStatus::Offline);

        let handle = state.sessions().active_for_room(ROOM).unwrap();
        assert_eq!(handle.lock().await.status(), SessionStatus::Running);
    }

    #[test]
    fn handler_filter_routes_by_event_type() {
        assert_eq!(DeviceEventHandler::route(EventType::DeviceStateChanged), Route::Gameplay);
        assert_eq!(DeviceEventHandler::route(EventType::EmergencyStopTriggered), Route::Gameplay);
        assert_eq!(DeviceEventHandler::route(EventType::ControllerHeartbeat), Route::Liveness);
        assert_eq!(DeviceEventHandler::route(EventType::ControllerOnline), Route::Liveness);
        assert_eq!(DeviceEventHandler::route(EventType::ControllerOffline), Route::Liveness);
        assert_eq!(DeviceEventHandler::route(EventType::PuzzleSolved), Route::Skip);
        assert_eq!(DeviceEventHandler::route(EventType::SceneAdvanced), Route::Skip);
        assert_eq!(DeviceEventHandler::route(EventType::SessionStarted), Route::Skip);
    }
}
