use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::geo::Coordinate;
use crate::physics;
use crate::vehicle::{ControlUpdate, VehicleState};

pub const DEFAULT_SESSION_ID: &str = "default";

/// A simulated vehicle plus the instant its clock last advanced.
#[derive(Debug, Clone)]
pub struct Session {
    pub state: VehicleState,
    pub last_update: Instant,
}

impl Session {
    pub fn new(state: VehicleState, now: Instant) -> Self {
        Self {
            state,
            last_update: now,
        }
    }

    /// Merge `controls`, then step the physics by the time elapsed since the
    /// previous advance (clamped to `max_dt`).
    pub fn advance(
        &mut self,
        controls: &ControlUpdate,
        now: Instant,
        max_dt: f64,
    ) -> &VehicleState {
        controls.apply(&mut self.state);

        // a request that waited on the lock may carry an older instant
        let now = now.max(self.last_update);
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.last_update = now;

        let state = std::mem::take(&mut self.state);
        self.state = physics::step(state, elapsed, max_dt);
        &self.state
    }
}

type Entry = Arc<Mutex<Session>>;

/// Keyed holder of per-session vehicle state.
///
/// The outer map lock is only held long enough to find or insert an entry;
/// each entry has its own mutex, so updates to one session are serialized
/// while different sessions proceed independently.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Entry>>,
    origin: Coordinate,
    max_delta_time: f64,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(
            Coordinate::new(crate::vehicle::DEFAULT_LATITUDE, crate::vehicle::DEFAULT_LONGITUDE),
            physics::MAX_DELTA_TIME,
        )
    }
}

impl SessionStore {
    pub fn new(origin: Coordinate, max_delta_time: f64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            origin,
            max_delta_time,
        }
    }

    pub fn origin(&self) -> Coordinate {
        self.origin
    }

    async fn entry(&self, id: &str) -> Option<Entry> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn entry_or_create(&self, id: &str, now: Instant) -> Entry {
        if let Some(entry) = self.entry(id).await {
            return entry;
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                info!("Creating session {}", id);
                let state = VehicleState::at(self.origin.lat, self.origin.lng);
                Arc::new(Mutex::new(Session::new(state, now)))
            })
            .clone()
    }

    /// Snapshot of a session, or `None` if it was never created.
    pub async fn get(&self, id: &str) -> Option<Session> {
        let entry = self.entry(id).await?;
        let session = entry.lock().await;
        Some(session.clone())
    }

    pub async fn put(&self, id: &str, state: VehicleState, timestamp: Instant) {
        let entry = self.entry_or_create(id, timestamp).await;
        let mut session = entry.lock().await;
        *session = Session::new(state, timestamp);
    }

    /// Replace a session with a parked vehicle at the given coordinates and
    /// restart its clock.
    pub async fn reset(&self, id: &str, lat: f64, lng: f64) -> Session {
        info!("Resetting session {} to ({}, {})", id, lat, lng);
        let now = Instant::now();
        let session = Session::new(VehicleState::at(lat, lng), now);
        self.put(id, session.state.clone(), now).await;
        session
    }

    /// Apply a control update to a session, creating it at the store's origin
    /// if needed, and return the resulting state.
    pub async fn advance(
        &self,
        id: &str,
        controls: &ControlUpdate,
        now: Instant,
    ) -> VehicleState {
        let entry = self.entry_or_create(id, now).await;
        let mut session = entry.lock().await;
        let state = session.advance(controls, now, self.max_delta_time).clone();
        debug!(
            "Session {} -> speed {:.2} km/h, rpm {:.0}, heading {:.1}",
            id, state.speed, state.rpm, state.heading
        );
        state
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
