//! Process-wide registry of live socket sessions.
//!
//! The registry is the only shared mutable structure on the socket side. It
//! never holds its lock across I/O: delivery snapshots the target senders
//! under a read lock, releases it, then pushes frames.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parlor_shared::{Principal, Room, SessionId, UserId};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::protocol::ServerEvent;

/// One serialized event, shared by every session it is delivered to.
pub type Frame = Arc<str>;

struct SessionEntry {
    principal: Principal,
    tx: mpsc::Sender<Frame>,
    rooms: HashSet<Room>,
    last_seen: Instant,
}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<SessionId, SessionEntry>,
    by_principal: HashMap<UserId, HashSet<SessionId>>,
    by_room: HashMap<Room, HashSet<SessionId>>,
}

impl RegistryState {
    fn join(&mut self, session_id: SessionId, room: Room) {
        if let Some(entry) = self.sessions.get_mut(&session_id) {
            if entry.rooms.insert(room) {
                self.by_room.entry(room).or_default().insert(session_id);
            }
        }
    }

    fn leave(&mut self, session_id: SessionId, room: Room) {
        let should_remove = match self.by_room.get_mut(&room) {
            Some(members) => {
                members.remove(&session_id);
                members.is_empty()
            }
            None => false,
        };
        if should_remove {
            self.by_room.remove(&room);
        }
    }

    fn remove(&mut self, session_id: SessionId) -> Option<SessionEntry> {
        let entry = self.sessions.remove(&session_id)?;

        for room in &entry.rooms {
            self.leave(session_id, *room);
        }

        let principal = entry.principal.id;
        let should_remove = match self.by_principal.get_mut(&principal) {
            Some(sessions) => {
                sessions.remove(&session_id);
                sessions.is_empty()
            }
            None => false,
        };
        if should_remove {
            self.by_principal.remove(&principal);
        }

        Some(entry)
    }
}

/// Outcome of one delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Distinct sessions addressed.
    pub targets: usize,
    pub delivered: usize,
    /// Frames lost to a full or closed session queue.
    pub dropped: usize,
}

#[derive(Clone)]
pub struct SessionRegistry {
    state: Arc<RwLock<RegistryState>>,
    buffer: usize,
}

impl SessionRegistry {
    /// `buffer` is the per-session outbound queue capacity.
    pub fn new(buffer: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
            buffer: buffer.max(1),
        }
    }

    /// Create a session for an authenticated principal and join its personal
    /// room. The receiver yields every frame addressed to the session; it
    /// ends once the session is unregistered or reaped.
    pub async fn register(&self, principal: Principal) -> (SessionId, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel::<Frame>(self.buffer);
        let session_id = SessionId::new();
        let user_id = principal.id;

        let mut state = self.state.write().await;
        state.sessions.insert(
            session_id,
            SessionEntry {
                principal,
                tx,
                rooms: HashSet::new(),
                last_seen: Instant::now(),
            },
        );
        state.by_principal.entry(user_id).or_default().insert(session_id);
        state.join(session_id, Room::User(user_id));

        info!(
            session = %session_id,
            user = %user_id,
            devices = state.by_principal.get(&user_id).map_or(0, HashSet::len),
            "Session registered"
        );

        (session_id, rx)
    }

    /// Returns `false` if the session was already gone.
    pub async fn unregister(&self, session_id: SessionId) -> bool {
        let removed = self.state.write().await.remove(session_id);
        if let Some(entry) = &removed {
            info!(session = %session_id, user = %entry.principal.id, "Session unregistered");
        }
        removed.is_some()
    }

    /// Join additional rooms. Joining a room twice is harmless. Returns the
    /// full room set after the join.
    pub async fn join_rooms(
        &self,
        session_id: SessionId,
        rooms: impl IntoIterator<Item = Room>,
    ) -> Vec<Room> {
        let mut state = self.state.write().await;
        for room in rooms {
            state.join(session_id, room);
        }
        sorted_rooms(state.sessions.get(&session_id))
    }

    /// Replace the session's group rooms with `rooms`, keeping the personal
    /// room. Used when a client re-joins after a reconnect.
    pub async fn reset_rooms(
        &self,
        session_id: SessionId,
        rooms: impl IntoIterator<Item = Room>,
    ) -> Vec<Room> {
        let wanted: HashSet<Room> = rooms.into_iter().collect();
        let mut state = self.state.write().await;

        let (personal, current) = match state.sessions.get(&session_id) {
            Some(entry) => (Room::User(entry.principal.id), entry.rooms.clone()),
            None => return Vec::new(),
        };

        for room in current.difference(&wanted) {
            if *room != personal {
                state.leave(session_id, *room);
                if let Some(entry) = state.sessions.get_mut(&session_id) {
                    entry.rooms.remove(room);
                }
            }
        }
        for room in wanted {
            state.join(session_id, room);
        }
        state.join(session_id, personal);

        sorted_rooms(state.sessions.get(&session_id))
    }

    /// Record activity on a session.
    pub async fn touch(&self, session_id: SessionId) {
        if let Some(entry) = self.state.write().await.sessions.get_mut(&session_id) {
            entry.last_seen = Instant::now();
        }
    }

    /// Drop every session silent for longer than `max_idle`. Dropping a
    /// session closes its frame queue, which ends the socket's write loop.
    pub async fn reap_idle(&self, max_idle: Duration) -> Vec<SessionId> {
        self.reap_idle_at(Instant::now(), max_idle).await
    }

    async fn reap_idle_at(&self, now: Instant, max_idle: Duration) -> Vec<SessionId> {
        let mut state = self.state.write().await;
        let stale: Vec<SessionId> = state
            .sessions
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_seen) > max_idle)
            .map(|(id, _)| *id)
            .collect();

        for session_id in &stale {
            if let Some(entry) = state.remove(*session_id) {
                warn!(
                    session = %session_id,
                    user = %entry.principal.id,
                    "Reaped session after missed heartbeat"
                );
            }
        }
        stale
    }

    /// Push `event` to every session in any of `rooms`. A session in
    /// several of the rooms receives the event once. Rooms with no live
    /// session are skipped silently.
    pub async fn deliver(
        &self,
        rooms: &[Room],
        event: &ServerEvent,
    ) -> Result<DeliveryReport, serde_json::Error> {
        let frame: Frame = serde_json::to_string(event)?.into();

        let targets: Vec<(SessionId, mpsc::Sender<Frame>)> = {
            let state = self.state.read().await;
            let mut seen = HashSet::new();
            let targets = rooms
                .iter()
                .filter_map(|room| state.by_room.get(room))
                .flatten()
                .filter(|id| seen.insert(**id))
                .filter_map(|id| state.sessions.get(id).map(|e| (*id, e.tx.clone())))
                .collect();
            targets
        };

        Ok(push(targets, frame, event.name()))
    }

    /// Push `event` to one session only.
    pub async fn send_to(
        &self,
        session_id: SessionId,
        event: &ServerEvent,
    ) -> Result<DeliveryReport, serde_json::Error> {
        let frame: Frame = serde_json::to_string(event)?.into();
        let target = self
            .state
            .read()
            .await
            .sessions
            .get(&session_id)
            .map(|e| (session_id, e.tx.clone()));
        Ok(push(target.into_iter().collect(), frame, event.name()))
    }

    /// Users with a live session whose principal holds `permission`.
    pub async fn connected_with_permission(&self, permission: &str) -> Vec<UserId> {
        let state = self.state.read().await;
        let mut users: Vec<UserId> = state
            .sessions
            .values()
            .filter(|e| e.principal.has_permission(permission))
            .map(|e| e.principal.id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        users.sort();
        users
    }

    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    pub async fn sessions_for(&self, user_id: UserId) -> usize {
        self.state
            .read()
            .await
            .by_principal
            .get(&user_id)
            .map_or(0, HashSet::len)
    }

    pub async fn rooms_of(&self, session_id: SessionId) -> Vec<Room> {
        sorted_rooms(self.state.read().await.sessions.get(&session_id))
    }
}

fn sorted_rooms(entry: Option<&SessionEntry>) -> Vec<Room> {
    let mut rooms: Vec<Room> = entry
        .map(|e| e.rooms.iter().copied().collect())
        .unwrap_or_default();
    rooms.sort_by_key(|r| r.to_string());
    rooms
}

fn push(targets: Vec<(SessionId, mpsc::Sender<Frame>)>, frame: Frame, event: &str) -> DeliveryReport {
    let mut report = DeliveryReport {
        targets: targets.len(),
        ..DeliveryReport::default()
    };

    for (session_id, tx) in targets {
        match tx.try_send(Arc::clone(&frame)) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                report.dropped += 1;
                debug!(session = %session_id, event, error = %e, "Dropping frame for session");
            }
        }
    }
    report
}
