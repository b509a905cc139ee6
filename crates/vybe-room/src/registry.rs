//! Room registry: creates rooms on first join, drops them when empty, and
//! fans events out to their members.
//!
//! # Locking
//!
//! ```text
//! room.fanout (Mutex) ──→ room.members (RwLock)
//! rooms (registry RwLock)                             (held alone)
//! ```
//!
//! The registry lock only guards the map and is never held while waiting
//! on a room's lock, so a broadcast stalled on one slow socket can't block
//! lookups in other rooms. The member that empties a room retires it under
//! the members write lock, then drops the registry entry if it still
//! points at that room. A join that lands on a retired room discards the
//! stale entry and retries with a fresh one.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use vybe_protocol::{Codec, Event, Identity, JsonCodec, RoomId, Track};
use vybe_session::Session;
use vybe_transport::{Connection, ConnectionId};

use crate::{Room, RoomError, RoomInfo};

/// Outcome of one [`RoomRegistry::broadcast`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members that received the event.
    pub delivered: usize,
    /// Members whose write failed; they were closed and removed.
    pub evicted: Vec<ConnectionId>,
}

/// Owns every live room, keyed by room id.
///
/// Constructed once by the server and shared (`Arc`) with every
/// connection task. Independent registries share nothing, which keeps
/// tests isolated.
pub struct RoomRegistry<C: Connection, K: Codec = JsonCodec> {
    rooms: RwLock<HashMap<RoomId, Arc<Room<C>>>>,
    codec: K,
}

impl<C: Connection> RoomRegistry<C, JsonCodec> {
    /// Creates an empty registry that broadcasts JSON.
    pub fn new() -> Self {
        Self::with_codec(JsonCodec)
    }
}

impl<C: Connection> Default for RoomRegistry<C, JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connection, K: Codec> RoomRegistry<C, K> {
    /// Creates an empty registry that encodes broadcasts with `codec`.
    pub fn with_codec(codec: K) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            codec,
        }
    }

    pub fn codec(&self) -> &K {
        &self.codec
    }

    // -- Membership ---------------------------------------------------------

    /// Adds `session` to the room it was admitted to, creating the room if
    /// this is its first member.
    pub async fn join_room(&self, session: Arc<Session<C>>) {
        let room_id = session.room_id().clone();
        let conn_id = session.id();

        loop {
            let room = {
                let mut rooms = self.rooms.write().await;
                let room = rooms.entry(room_id.clone()).or_insert_with(|| {
                    tracing::info!(%room_id, "room created");
                    Arc::new(Room::new(room_id.clone()))
                });
                Arc::clone(room)
            };

            let mut members = room.members.write().await;
            if room.is_retired() {
                drop(members);
                tracing::debug!(%room_id, %conn_id, "room retired during join, retrying");
                self.unregister(&room).await;
                continue;
            }

            members.insert(conn_id, session);
            tracing::info!(
                %room_id,
                %conn_id,
                members = members.len(),
                "session joined room"
            );
            return;
        }
    }

    /// Removes a session from a room and drops the room once it is empty.
    ///
    /// Leaving a room the session isn't in (or a room that doesn't exist)
    /// is a no-op.
    pub async fn leave_room(&self, room_id: &RoomId, conn_id: ConnectionId) {
        let Some(room) = self.room(room_id).await else {
            return;
        };

        let now_empty = {
            let mut members = room.members.write().await;
            if members.remove(&conn_id).is_none() {
                return;
            }
            tracing::info!(
                %room_id,
                %conn_id,
                members = members.len(),
                "session left room"
            );
            if members.is_empty() {
                room.retire();
            }
            members.is_empty()
        };

        if now_empty && self.unregister(&room).await {
            tracing::info!(%room_id, "room removed");
        }
    }

    /// Drops the registry entry for `room` if it still points at that
    /// room; it may have been replaced by a fresh one in the meantime.
    async fn unregister(&self, room: &Arc<Room<C>>) -> bool {
        let mut rooms = self.rooms.write().await;
        let current = rooms
            .get(room.id())
            .is_some_and(|current| Arc::ptr_eq(current, room));
        if current {
            rooms.remove(room.id());
        }
        current
    }

    // -- Broadcast ----------------------------------------------------------

    /// Encodes `event` once and writes it to every member of the room.
    ///
    /// A failed write doesn't stop delivery to the rest. After the pass,
    /// failed members are removed under the write lock and their
    /// connections closed. Broadcasting to a room that doesn't exist
    /// delivers nothing.
    ///
    /// # Errors
    /// [`RoomError::Protocol`] if the event can't be encoded; nothing is
    /// sent in that case.
    pub async fn broadcast(
        &self,
        room_id: &RoomId,
        event: &Event,
    ) -> Result<BroadcastReport, RoomError> {
        let Some(room) = self.room(room_id).await else {
            return Ok(BroadcastReport::default());
        };
        let bytes = self.codec.encode(event)?;

        let _order = room.fanout.lock().await;

        let mut report = BroadcastReport::default();
        {
            let members = room.members.read().await;
            for (conn_id, session) in members.iter() {
                match session.send(&bytes).await {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        tracing::warn!(
                            %room_id,
                            %conn_id,
                            event = event.kind(),
                            error = %e,
                            "broadcast write failed"
                        );
                        report.evicted.push(*conn_id);
                    }
                }
            }
        }

        if !report.evicted.is_empty() {
            self.evict(&room, &report.evicted).await;
        }

        tracing::debug!(
            %room_id,
            event = event.kind(),
            delivered = report.delivered,
            evicted = report.evicted.len(),
            "broadcast"
        );
        Ok(report)
    }

    /// Removes members whose connection failed and closes them.
    async fn evict(&self, room: &Arc<Room<C>>, failed: &[ConnectionId]) {
        let room_id = room.id();
        let (removed, now_empty) = {
            let mut members = room.members.write().await;
            let removed: Vec<Arc<Session<C>>> = failed
                .iter()
                .filter_map(|conn_id| members.remove(conn_id))
                .collect();
            if members.is_empty() {
                room.retire();
            }
            (removed, members.is_empty())
        };

        if now_empty && self.unregister(room).await {
            tracing::info!(%room_id, "room removed after eviction");
        }

        for session in removed {
            tracing::info!(
                %room_id,
                conn_id = %session.id(),
                "evicting unreachable session"
            );
            session.close().await;
        }
    }

    /// Broadcasts `user_joined` for a newly authenticated member.
    pub async fn notify_user_joined(
        &self,
        room_id: &RoomId,
        user: &Identity,
    ) -> Result<BroadcastReport, RoomError> {
        let event = Event::UserJoined { user: user.clone() };
        self.broadcast(room_id, &event).await
    }

    /// Broadcasts `user_left` for a departing authenticated member.
    pub async fn notify_user_left(
        &self,
        room_id: &RoomId,
        user: &Identity,
    ) -> Result<BroadcastReport, RoomError> {
        let event = Event::UserLeft { user: user.clone() };
        self.broadcast(room_id, &event).await
    }

    /// Broadcasts the current roster as `all_users`.
    pub async fn broadcast_users(
        &self,
        room_id: &RoomId,
    ) -> Result<BroadcastReport, RoomError> {
        let users = self.room_users(room_id).await;
        self.broadcast(room_id, &Event::AllUsers { users }).await
    }

    // -- Queue --------------------------------------------------------------

    /// Appends a track to the room's queue. `false` if the room doesn't exist.
    pub async fn add_track(&self, room_id: &RoomId, track: Track) -> bool {
        match self.room(room_id).await {
            Some(room) => {
                room.add_track(track).await;
                true
            }
            None => false,
        }
    }

    /// Advances the room's queue. `None` at the end or for an unknown room.
    pub async fn next_track(&self, room_id: &RoomId) -> Option<Track> {
        self.room(room_id).await?.next_track().await
    }

    /// Steps the room's queue back. `None` at the start or for an unknown room.
    pub async fn previous_track(&self, room_id: &RoomId) -> Option<Track> {
        self.room(room_id).await?.previous_track().await
    }

    pub async fn current_track(&self, room_id: &RoomId) -> Option<Track> {
        self.room(room_id).await?.current_track().await
    }

    // -- Lookup -------------------------------------------------------------

    /// Returns the live room, if any.
    pub async fn room(&self, room_id: &RoomId) -> Option<Arc<Room<C>>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Identities of the room's authenticated members, in join order.
    pub async fn room_users(&self, room_id: &RoomId) -> Vec<Identity> {
        match self.room(room_id).await {
            Some(room) => room.users().await,
            None => Vec::new(),
        }
    }

    /// Number of sessions in the room; `0` if it doesn't exist.
    pub async fn member_count(&self, room_id: &RoomId) -> usize {
        match self.room(room_id).await {
            Some(room) => room.member_count().await,
            None => 0,
        }
    }

    /// Returns metadata about a room.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] if no such room is live.
    pub async fn room_info(&self, room_id: &RoomId) -> Result<RoomInfo, RoomError> {
        let room = self
            .room(room_id)
            .await
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        Ok(room.info().await)
    }

    /// Returns the number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Lists all live room ids.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.read().await.keys().cloned().collect()
    }
}
