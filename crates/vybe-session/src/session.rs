//! Session: the hub's record of one live connection.
//!
//! A session ties together:
//! - the connection itself (owned, closed at most once)
//! - the room and role it was admitted with (fixed)
//! - the user identity, bound once by the auth handshake

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use vybe_protocol::{Identity, Role, RoomId};
use vybe_transport::{Connection, ConnectionId};

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in the auth handshake.
///
/// ```text
///   Unauthenticated ──(auth ok)──→ Authenticated
/// ```
///
/// There is no way back: once authenticated, a session stays so until its
/// connection goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Only `auth` events are acted upon.
    Unauthenticated,
    /// Identity bound; host commands are accepted from hosts.
    Authenticated,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One connected participant.
///
/// The session is owned by its connection's read loop (usually behind an
/// `Arc`), while the room's membership set holds another reference for
/// broadcasting. Nothing but [`bind_identity`](Self::bind_identity) mutates
/// it, and that only once.
pub struct Session<C: Connection> {
    connection: C,
    room_id: RoomId,
    role: Role,
    identity: OnceLock<Identity>,
    closed: AtomicBool,
}

impl<C: Connection> Session<C> {
    /// Wraps a freshly admitted connection.
    pub fn new(connection: C, room_id: RoomId, role: Role) -> Self {
        Self {
            connection,
            room_id,
            role,
            identity: OnceLock::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_host(&self) -> bool {
        self.role.is_host()
    }

    /// The bound identity, or `None` before the handshake completes.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.get()
    }

    pub fn state(&self) -> SessionState {
        if self.identity.get().is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    /// Binds the verified identity. Succeeds at most once per session.
    ///
    /// # Errors
    /// [`SessionError::AlreadyAuthenticated`] if an identity is already bound;
    /// the existing identity is left untouched.
    pub fn bind_identity(
        &self,
        identity: Identity,
    ) -> Result<&Identity, SessionError> {
        self.identity
            .set(identity)
            .map_err(|_| SessionError::AlreadyAuthenticated(self.id()))?;
        self.identity
            .get()
            .ok_or(SessionError::AlreadyAuthenticated(self.id()))
    }

    /// Writes one encoded frame to the peer.
    pub async fn send(&self, data: &[u8]) -> Result<(), C::Error> {
        self.connection.send(data).await
    }

    /// Reads the next frame; `Ok(None)` on clean close.
    pub async fn recv(&self) -> Result<Option<Vec<u8>>, C::Error> {
        self.connection.recv().await
    }

    /// Closes the connection if nobody has yet.
    ///
    /// Both eviction after a failed broadcast and the read loop's teardown
    /// call this; only the first call reaches the transport. Returns `true`
    /// for that first call.
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Err(e) = self.connection.close().await {
            tracing::debug!(
                conn_id = %self.id(),
                error = %e,
                "error while closing connection"
            );
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Borrow the underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }
}

impl<C: Connection> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("room_id", &self.room_id)
            .field("role", &self.role)
            .field("identity", &self.identity.get())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use vybe_transport::memory::{self, MemoryConnection};

    use super::*;

    fn room() -> RoomId {
        RoomId::new("r1").unwrap()
    }

    fn ada() -> Identity {
        Identity {
            id: "1".into(),
            name: "Ada".into(),
            ..Identity::default()
        }
    }

    fn session(role: Role) -> Session<MemoryConnection> {
        let (conn, _peer) = memory::pair();
        Session::new(conn, room(), role)
    }

    #[test]
    fn test_new_session_is_unauthenticated() {
        let s = session(Role::Listener);
        assert_eq!(s.state(), SessionState::Unauthenticated);
        assert!(s.identity().is_none());
        assert_eq!(s.room_id(), &room());
        assert!(!s.is_host());
    }

    #[test]
    fn test_bind_identity_transitions_to_authenticated() {
        let s = session(Role::Host);
        let bound = s.bind_identity(ada()).expect("first bind succeeds");
        assert_eq!(bound.name, "Ada");
        assert!(s.is_authenticated());
        assert!(s.is_host());
    }

    #[test]
    fn test_bind_identity_twice_keeps_first() {
        let s = session(Role::Listener);
        s.bind_identity(ada()).unwrap();

        let other = Identity {
            id: "2".into(),
            name: "Grace".into(),
            ..Identity::default()
        };
        let result = s.bind_identity(other);

        assert!(matches!(
            result,
            Err(SessionError::AlreadyAuthenticated(id)) if id == s.id()
        ));
        assert_eq!(s.identity().map(|i| i.name.as_str()), Some("Ada"));
    }

    #[tokio::test]
    async fn test_close_reaches_transport_once() {
        let (conn, peer) = memory::pair();
        let s = Session::new(conn, room(), Role::Listener);

        assert!(s.close().await, "first close should win");
        assert!(!s.close().await, "second close should be a no-op");

        assert!(s.is_closed());
        assert!(peer.is_closed());
        assert_eq!(s.connection().close_calls(), 1);
    }

    #[tokio::test]
    async fn test_send_and_recv_delegate_to_connection() {
        let (conn, mut peer) = memory::pair();
        let s = Session::new(conn, room(), Role::Host);

        s.send(b"hi").await.unwrap();
        assert_eq!(peer.recv().await.unwrap(), b"hi");

        peer.send("yo").unwrap();
        assert_eq!(s.recv().await.unwrap().unwrap(), b"yo");
    }
}
