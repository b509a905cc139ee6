//! A room: its members and its playback queue.
//!
//! Each room carries its own locks, so traffic in one room never waits on
//! another room's queue:
//!
//! - `members` — read for fan-out and rosters, write for join/leave/evict
//! - `queue` — read for `current`, write for push/advance/retreat
//! - `fanout` — held for the whole of a broadcast so two broadcasts to the
//!   same room never interleave their writes
//!
//! Structural changes to membership go through [`RoomRegistry`](crate::RoomRegistry),
//! which also decides when an empty room is dropped. Once its last member
//! leaves, a room is retired for good; later joins go to a fresh room.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, RwLock};
use vybe_protocol::{Identity, RoomId, Track};
use vybe_session::Session;
use vybe_transport::{Connection, ConnectionId};

use crate::PlaybackQueue;

/// Members keyed by connection id; iteration follows connection order.
pub(crate) type Members<C> = BTreeMap<ConnectionId, Arc<Session<C>>>;

/// A snapshot of room metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    /// Connected sessions, authenticated or not.
    pub member_count: usize,
    /// Members that completed the auth handshake.
    pub authenticated_count: usize,
    pub queue_len: usize,
    /// `None` when there is no current track.
    pub cursor: Option<usize>,
}

/// One synchronized-playback session.
pub struct Room<C: Connection> {
    id: RoomId,
    pub(crate) members: RwLock<Members<C>>,
    queue: RwLock<PlaybackQueue>,
    pub(crate) fanout: Mutex<()>,
    /// Set under the `members` write lock when the room empties.
    retired: AtomicBool,
}

impl<C: Connection> Room<C> {
    pub(crate) fn new(id: RoomId) -> Self {
        Self {
            id,
            members: RwLock::new(BTreeMap::new()),
            queue: RwLock::new(PlaybackQueue::new()),
            fanout: Mutex::new(()),
            retired: AtomicBool::new(false),
        }
    }

    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    /// Whether the room emptied and no longer accepts members.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub async fn member_count(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn contains(&self, conn_id: ConnectionId) -> bool {
        self.members.read().await.contains_key(&conn_id)
    }

    /// Identities of authenticated members, in connection order.
    pub async fn users(&self) -> Vec<Identity> {
        self.members
            .read()
            .await
            .values()
            .filter_map(|s| s.identity().cloned())
            .collect()
    }

    /// Appends a track; the first one becomes current.
    pub async fn add_track(&self, track: Track) {
        let mut queue = self.queue.write().await;
        queue.push(track);
        tracing::debug!(
            room_id = %self.id,
            queue_len = queue.len(),
            "track queued"
        );
    }

    /// Advances to and returns the next track, or `None` at the end.
    pub async fn next_track(&self) -> Option<Track> {
        self.queue.write().await.advance().cloned()
    }

    /// Goes back to and returns the previous track, or `None` at the start.
    pub async fn previous_track(&self) -> Option<Track> {
        self.queue.write().await.retreat().cloned()
    }

    pub async fn current_track(&self) -> Option<Track> {
        self.queue.read().await.current().cloned()
    }

    /// A copy of the queue, for inspection.
    pub async fn queue(&self) -> PlaybackQueue {
        self.queue.read().await.clone()
    }

    pub async fn info(&self) -> RoomInfo {
        let (member_count, authenticated_count) = {
            let members = self.members.read().await;
            let authed = members.values().filter(|s| s.is_authenticated()).count();
            (members.len(), authed)
        };
        let queue = self.queue.read().await;
        RoomInfo {
            room_id: self.id.clone(),
            member_count,
            authenticated_count,
            queue_len: queue.len(),
            cursor: queue.cursor(),
        }
    }
}
