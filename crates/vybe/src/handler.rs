//! Per-connection handler: auth handshake and command dispatch.
//!
//! Each admitted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Join the room named at admission (unauthenticated)
//!   2. Loop: receive events; before auth only `auth` is acted upon
//!   3. After auth: route host commands to the room
//!   4. On exit: announce `user_left` (if authenticated), leave, close

use std::sync::Arc;

use tokio::time::Instant;
use vybe_protocol::{Codec, Event, Identity};
use vybe_session::{IdentityVerifier, Session};
use vybe_transport::Connection;

use crate::server::ServerState;
use crate::{Admission, VybeError};

/// What the read loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Close,
}

/// Drop guard that removes the session from its room when the handler
/// exits.
///
/// The normal path calls [`finish`](Self::finish). If the handler task is
/// cancelled or panics instead, `Drop` spawns the same teardown.
struct SessionGuard<C: Connection, V: IdentityVerifier, K: Codec> {
    inner: Option<(Arc<Session<C>>, Arc<ServerState<C, V, K>>)>,
}

impl<C: Connection, V: IdentityVerifier, K: Codec> SessionGuard<C, V, K> {
    async fn finish(mut self) {
        if let Some((session, state)) = self.inner.take() {
            teardown(&session, &state).await;
        }
    }
}

impl<C: Connection, V: IdentityVerifier, K: Codec> Drop for SessionGuard<C, V, K> {
    fn drop(&mut self) {
        let Some((session, state)) = self.inner.take() else {
            return;
        };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                teardown(&session, &state).await;
            });
        }
    }
}

/// Handles a single admitted connection from join to close.
pub(crate) async fn handle_connection<C, V, K>(
    conn: C,
    admission: Admission,
    state: Arc<ServerState<C, V, K>>,
) -> Result<(), VybeError>
where
    C: Connection,
    V: IdentityVerifier,
    K: Codec,
{
    let session = Arc::new(Session::new(conn, admission.room_id, admission.role));
    tracing::info!(
        conn_id = %session.id(),
        room_id = %session.room_id(),
        role = %session.role(),
        "connection admitted"
    );

    state.registry.join_room(Arc::clone(&session)).await;
    let guard = SessionGuard {
        inner: Some((Arc::clone(&session), Arc::clone(&state))),
    };

    let result = read_loop(&session, &state).await;
    guard.finish().await;
    result
}

async fn read_loop<C, V, K>(
    session: &Arc<Session<C>>,
    state: &Arc<ServerState<C, V, K>>,
) -> Result<(), VybeError>
where
    C: Connection,
    V: IdentityVerifier,
    K: Codec,
{
    let conn_id = session.id();
    let auth_deadline = state.auth_timeout.map(|t| Instant::now() + t);

    loop {
        let received = match auth_deadline {
            Some(deadline) if !session.is_authenticated() => {
                match tokio::time::timeout_at(deadline, session.recv()).await {
                    Ok(received) => received,
                    Err(_) => {
                        tracing::info!(%conn_id, "auth handshake timed out");
                        return Ok(());
                    }
                }
            }
            _ => session.recv().await,
        };

        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                return Ok(());
            }
        };

        let event: Event = match state.registry.codec().decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "dropping undecodable event");
                continue;
            }
        };

        if dispatch(session, state, event).await? == Flow::Close {
            return Ok(());
        }
    }
}

/// Acts on one decoded event from `session`.
///
/// # Errors
/// [`VybeError::Session`] when the presented credential is rejected; the
/// rejection has already been sent and the caller must close the
/// connection. Encoding failures surface as [`VybeError::Room`] or
/// [`VybeError::Protocol`].
pub(crate) async fn dispatch<C, V, K>(
    session: &Arc<Session<C>>,
    state: &ServerState<C, V, K>,
    event: Event,
) -> Result<Flow, VybeError>
where
    C: Connection,
    V: IdentityVerifier,
    K: Codec,
{
    // Eviction closes the session without stopping its read loop.
    if session.is_closed() {
        tracing::debug!(conn_id = %session.id(), event = event.kind(), "dropping event for closed session");
        return Ok(Flow::Close);
    }

    if !session.is_authenticated() {
        return authenticate(session, state, event).await;
    }

    let conn_id = session.id();
    let room_id = session.room_id();
    let registry = &state.registry;

    match event {
        Event::AddToQueue { .. }
        | Event::Next { .. }
        | Event::Previous { .. }
        | Event::Play {}
        | Event::Pause {}
            if !session.is_host() =>
        {
            tracing::debug!(%conn_id, event = event.kind(), "ignoring host command from listener");
        }

        Event::AddToQueue { song } => {
            if song.is_empty() {
                tracing::debug!(%conn_id, "ignoring addToQueue without a track id");
                return Ok(Flow::Continue);
            }
            registry.add_track(room_id, song.clone()).await;
            registry.broadcast(room_id, &Event::AddToQueue { song }).await?;
        }

        Event::Next { .. } => match registry.next_track(room_id).await {
            Some(song) => {
                registry
                    .broadcast(room_id, &Event::Next { song: Some(song) })
                    .await?;
            }
            None => tracing::debug!(%room_id, "next: end of queue"),
        },

        Event::Previous { .. } => match registry.previous_track(room_id).await {
            Some(song) => {
                registry
                    .broadcast(room_id, &Event::Previous { song: Some(song) })
                    .await?;
            }
            None => tracing::debug!(%room_id, "previous: already at start"),
        },

        Event::Play {} | Event::Pause {} => {
            registry.broadcast(room_id, &event).await?;
        }

        Event::Auth { .. } => {
            tracing::debug!(%conn_id, "ignoring auth from authenticated session");
        }

        other => {
            tracing::debug!(%conn_id, event = other.kind(), "ignoring unrecognized event");
        }
    }

    Ok(Flow::Continue)
}

/// Handles an event from a session that has not authenticated yet.
async fn authenticate<C, V, K>(
    session: &Arc<Session<C>>,
    state: &ServerState<C, V, K>,
    event: Event,
) -> Result<Flow, VybeError>
where
    C: Connection,
    V: IdentityVerifier,
    K: Codec,
{
    let conn_id = session.id();
    let token = match event {
        Event::Auth { token } if !token.is_empty() => token,
        other => {
            tracing::debug!(%conn_id, event = other.kind(), "ignoring event before authentication");
            return Ok(Flow::Continue);
        }
    };

    let identity = match state.verifier.verify(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(%conn_id, error = %e, "authentication failed");
            if let Err(send_err) = send_event(session, state, &Event::unauthorized()).await {
                tracing::debug!(%conn_id, error = %send_err, "could not deliver rejection");
            }
            return Err(e.into());
        }
    };

    // The session only counts as present once auth_success went out;
    // a peer that never saw it is never announced, so it never leaves.
    let reply = Event::AuthSuccess {
        user: identity.clone(),
        is_host: session.is_host(),
    };
    if let Err(e) = send_event(session, state, &reply).await {
        tracing::debug!(%conn_id, error = %e, "could not deliver auth_success");
        return Ok(Flow::Close);
    }
    let user: Identity = session.bind_identity(identity)?.clone();
    tracing::info!(
        %conn_id,
        room_id = %session.room_id(),
        user = %user,
        "session authenticated"
    );

    let room_id = session.room_id();
    state.registry.notify_user_joined(room_id, &user).await?;
    state.registry.broadcast_users(room_id).await?;
    Ok(Flow::Continue)
}

/// Writes one event to this session only.
async fn send_event<C, V, K>(
    session: &Session<C>,
    state: &ServerState<C, V, K>,
    event: &Event,
) -> Result<(), VybeError>
where
    C: Connection,
    V: IdentityVerifier,
    K: Codec,
{
    let bytes = state.registry.codec().encode(event)?;
    session
        .send(&bytes)
        .await
        .map_err(|e| VybeError::Connection(Box::new(e)))
}

/// Announces the departure, leaves the room, and closes the connection.
async fn teardown<C, V, K>(session: &Arc<Session<C>>, state: &ServerState<C, V, K>)
where
    C: Connection,
    V: IdentityVerifier,
    K: Codec,
{
    let room_id = session.room_id();
    if let Some(user) = session.identity() {
        if let Err(e) = state.registry.notify_user_left(room_id, user).await {
            tracing::debug!(%room_id, error = %e, "could not announce departure");
        }
    }
    state.registry.leave_room(room_id, session.id()).await;
    session.close().await;
    tracing::info!(conn_id = %session.id(), %room_id, "connection closed");
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use vybe_protocol::{JsonCodec, Role, RoomId, Track};
    use vybe_room::RoomRegistry;
    use vybe_session::SessionError;
    use vybe_transport::memory::{self, MemoryConnection, MemoryPeer};

    use super::*;

    // =====================================================================
    // Fixtures
    // =====================================================================

    /// Maps fixed tokens to fixed identities; everything else is rejected.
    struct TokenVerifier {
        users: HashMap<String, Identity>,
    }

    impl TokenVerifier {
        fn new() -> Self {
            let users = ["alice", "bob", "carol"]
                .into_iter()
                .map(|name| (format!("{name}-token"), user(name)))
                .collect();
            Self { users }
        }
    }

    impl IdentityVerifier for TokenVerifier {
        async fn verify(&self, token: &str) -> Result<Identity, SessionError> {
            self.users
                .get(token)
                .cloned()
                .ok_or_else(|| SessionError::AuthFailed("invalid or expired token".into()))
        }
    }

    type TestState = ServerState<MemoryConnection, TokenVerifier, JsonCodec>;

    fn user(name: &str) -> Identity {
        Identity {
            id: format!("id-{name}"),
            email: format!("{name}@example.com"),
            name: name.to_string(),
            picture: String::new(),
        }
    }

    fn state(auth_timeout: Option<Duration>) -> Arc<TestState> {
        Arc::new(ServerState {
            registry: Arc::new(RoomRegistry::new()),
            verifier: TokenVerifier::new(),
            auth_timeout,
            handshake_timeout: Duration::from_secs(10),
        })
    }

    fn rid(id: &str) -> RoomId {
        RoomId::new(id).unwrap()
    }

    fn admission(room: &str, role: Role) -> Admission {
        Admission {
            room_id: rid(room),
            role,
        }
    }

    /// Runs a full connection handler against an in-memory peer.
    fn connect(
        state: &Arc<TestState>,
        room: &str,
        role: Role,
    ) -> (MemoryPeer, tokio::task::JoinHandle<Result<(), VybeError>>) {
        let (conn, peer) = memory::pair();
        let handle = tokio::spawn(handle_connection(
            conn,
            admission(room, role),
            Arc::clone(state),
        ));
        (peer, handle)
    }

    /// A session joined to `room` without a read loop, for driving
    /// [`dispatch`] directly.
    async fn joined(
        state: &TestState,
        room: &str,
        role: Role,
    ) -> (Arc<Session<MemoryConnection>>, MemoryPeer) {
        let (conn, peer) = memory::pair();
        let session = Arc::new(Session::new(conn, rid(room), role));
        state.registry.join_room(Arc::clone(&session)).await;
        (session, peer)
    }

    fn send(peer: &MemoryPeer, json: serde_json::Value) {
        peer.send(json.to_string()).expect("server side alive");
    }

    async fn next_event(peer: &mut MemoryPeer) -> Event {
        let frame = tokio::time::timeout(Duration::from_secs(2), peer.recv())
            .await
            .expect("timed out waiting for event")
            .expect("connection closed");
        serde_json::from_slice(&frame).expect("valid event JSON")
    }

    fn drained(peer: &mut MemoryPeer) -> Vec<Event> {
        peer.drain()
            .iter()
            .map(|f| serde_json::from_slice(f).unwrap())
            .collect()
    }

    /// Authenticates through the full handler and consumes the three
    /// handshake events the new member receives.
    async fn auth(peer: &mut MemoryPeer, name: &str) {
        send(peer, serde_json::json!({"type": "auth", "token": format!("{name}-token")}));
        assert!(matches!(next_event(peer).await, Event::AuthSuccess { .. }));
        assert!(matches!(next_event(peer).await, Event::UserJoined { .. }));
        assert!(matches!(next_event(peer).await, Event::AllUsers { .. }));
    }

    // =====================================================================
    // Handshake
    // =====================================================================

    #[tokio::test]
    async fn test_auth_success_replies_then_announces() {
        let state = state(None);
        let (mut peer, _handle) = connect(&state, "r1", Role::Host);

        send(&peer, serde_json::json!({"type": "auth", "token": "alice-token"}));

        assert_eq!(
            next_event(&mut peer).await,
            Event::AuthSuccess { user: user("alice"), is_host: true }
        );
        assert_eq!(
            next_event(&mut peer).await,
            Event::UserJoined { user: user("alice") }
        );
        assert_eq!(
            next_event(&mut peer).await,
            Event::AllUsers { users: vec![user("alice")] }
        );
    }

    #[tokio::test]
    async fn test_listener_auth_success_reports_not_host() {
        let state = state(None);
        let (mut peer, _handle) = connect(&state, "r1", Role::Listener);

        send(&peer, serde_json::json!({"type": "auth", "token": "bob-token"}));

        assert_eq!(
            next_event(&mut peer).await,
            Event::AuthSuccess { user: user("bob"), is_host: false }
        );
    }

    #[tokio::test]
    async fn test_second_member_auth_updates_roster_for_everyone() {
        let state = state(None);
        let (mut host, _h1) = connect(&state, "r1", Role::Host);
        auth(&mut host, "alice").await;

        let (mut listener, _h2) = connect(&state, "r1", Role::Listener);
        auth(&mut listener, "bob").await;

        assert_eq!(
            next_event(&mut host).await,
            Event::UserJoined { user: user("bob") }
        );
        assert_eq!(
            next_event(&mut host).await,
            Event::AllUsers { users: vec![user("alice"), user("bob")] }
        );
    }

    #[tokio::test]
    async fn test_events_before_auth_are_ignored() {
        let state = state(None);
        let (mut peer, _handle) = connect(&state, "r1", Role::Host);

        send(&peer, serde_json::json!({"type": "addToQueue", "song": {"title": "A", "videoID": "a"}}));
        send(&peer, serde_json::json!({"type": "play"}));
        send(&peer, serde_json::json!({"type": "auth", "token": ""}));
        send(&peer, serde_json::json!({"type": "auth"}));
        peer.send("not json").unwrap();

        // The handler processes frames in order, so once auth_success
        // arrives every earlier frame has been handled.
        auth(&mut peer, "alice").await;

        assert!(state.registry.current_track(&rid("r1")).await.is_none());
        assert!(drained(&mut peer).is_empty());
    }

    #[tokio::test]
    async fn test_host_command_after_auth_mutates_queue() {
        let state = state(None);
        let (mut peer, _handle) = connect(&state, "r1", Role::Host);

        send(&peer, serde_json::json!({"type": "addToQueue", "song": {"title": "A", "videoID": "a"}}));
        auth(&mut peer, "alice").await;
        send(&peer, serde_json::json!({"type": "addToQueue", "song": {"title": "B", "videoID": "b"}}));

        assert_eq!(
            next_event(&mut peer).await,
            Event::AddToQueue { song: Track::new("B", "b") }
        );
        let info = state.registry.room_info(&rid("r1")).await.unwrap();
        assert_eq!(info.queue_len, 1);
        assert_eq!(
            state.registry.current_track(&rid("r1")).await,
            Some(Track::new("B", "b"))
        );
    }

    #[tokio::test]
    async fn test_auth_failure_rejects_and_closes() {
        let state = state(None);
        let (mut peer, handle) = connect(&state, "r1", Role::Host);

        send(&peer, serde_json::json!({"type": "auth", "token": "forged"}));

        assert_eq!(next_event(&mut peer).await, Event::unauthorized());
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(VybeError::Session(SessionError::AuthFailed(_)))));
        assert!(peer.is_closed());
        assert_eq!(state.registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_auth_failure_sends_no_roster_events_to_room() {
        let state = state(None);
        let (mut host, _h1) = connect(&state, "r1", Role::Host);
        auth(&mut host, "alice").await;

        let (mut intruder, h2) = connect(&state, "r1", Role::Listener);
        send(&intruder, serde_json::json!({"type": "auth", "token": "forged"}));
        assert_eq!(next_event(&mut intruder).await, Event::unauthorized());
        let _ = h2.await;

        assert!(drained(&mut host).is_empty());
        assert_eq!(state.registry.member_count(&rid("r1")).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_timeout_closes_idle_connection() {
        let state = state(Some(Duration::from_secs(5)));
        let (mut peer, handle) = connect(&state, "r1", Role::Listener);

        peer.closed().await;

        assert!(handle.await.unwrap().is_ok());
        assert!(drained(&mut peer).is_empty());
        assert_eq!(state.registry.room_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_timeout_does_not_apply_after_auth() {
        let state = state(Some(Duration::from_secs(5)));
        let (mut peer, _handle) = connect(&state, "r1", Role::Host);
        auth(&mut peer, "alice").await;

        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(!peer.is_closed());
        assert_eq!(state.registry.member_count(&rid("r1")).await, 1);
    }

    // =====================================================================
    // Teardown
    // =====================================================================

    #[tokio::test]
    async fn test_authenticated_disconnect_announces_user_left() {
        let state = state(None);
        let (mut host, _h1) = connect(&state, "r1", Role::Host);
        auth(&mut host, "alice").await;
        let (mut listener, h2) = connect(&state, "r1", Role::Listener);
        auth(&mut listener, "bob").await;
        drained(&mut host);

        drop(listener);
        h2.await.unwrap().unwrap();

        assert_eq!(
            next_event(&mut host).await,
            Event::UserLeft { user: user("bob") }
        );
        assert_eq!(state.registry.member_count(&rid("r1")).await, 1);
        assert_eq!(state.registry.room_users(&rid("r1")).await, vec![user("alice")]);
    }

    #[tokio::test]
    async fn test_unauthenticated_disconnect_is_silent() {
        let state = state(None);
        let (mut host, _h1) = connect(&state, "r1", Role::Host);
        auth(&mut host, "alice").await;

        let (lurker, h2) = connect(&state, "r1", Role::Listener);
        drop(lurker);
        h2.await.unwrap().unwrap();

        assert!(drained(&mut host).is_empty());
        assert_eq!(state.registry.member_count(&rid("r1")).await, 1);
    }

    #[tokio::test]
    async fn test_last_member_disconnect_removes_room() {
        let state = state(None);
        let (mut peer, handle) = connect(&state, "r1", Role::Host);
        auth(&mut peer, "alice").await;

        drop(peer);
        handle.await.unwrap().unwrap();

        assert_eq!(state.registry.room_count().await, 0);
    }

    // =====================================================================
    // Dispatch
    // =====================================================================

    #[tokio::test]
    async fn test_dispatch_listener_commands_are_ignored() {
        let state = state(None);
        let (host, mut host_peer) = joined(&state, "r1", Role::Host).await;
        let (listener, mut listener_peer) = joined(&state, "r1", Role::Listener).await;
        host.bind_identity(user("alice")).unwrap();
        listener.bind_identity(user("bob")).unwrap();
        state.registry.add_track(&rid("r1"), Track::new("A", "a")).await;
        state.registry.add_track(&rid("r1"), Track::new("B", "b")).await;

        for event in [
            Event::AddToQueue { song: Track::new("C", "c") },
            Event::Next { song: None },
            Event::Previous { song: None },
            Event::Play {},
            Event::Pause {},
        ] {
            let flow = dispatch(&listener, &state, event).await.unwrap();
            assert_eq!(flow, Flow::Continue);
        }

        let info = state.registry.room_info(&rid("r1")).await.unwrap();
        assert_eq!(info.queue_len, 2);
        assert_eq!(info.cursor, Some(0));
        assert!(drained(&mut host_peer).is_empty());
        assert!(drained(&mut listener_peer).is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_host_next_and_previous_broadcast_new_current() {
        let state = state(None);
        let (host, _host_peer) = joined(&state, "r1", Role::Host).await;
        let (_listener, mut listener_peer) = joined(&state, "r1", Role::Listener).await;
        host.bind_identity(user("alice")).unwrap();
        state.registry.add_track(&rid("r1"), Track::new("A", "a")).await;
        state.registry.add_track(&rid("r1"), Track::new("B", "b")).await;

        dispatch(&host, &state, Event::Next { song: None }).await.unwrap();
        dispatch(&host, &state, Event::Previous { song: None }).await.unwrap();

        assert_eq!(
            drained(&mut listener_peer),
            vec![
                Event::Next { song: Some(Track::new("B", "b")) },
                Event::Previous { song: Some(Track::new("A", "a")) },
            ]
        );
    }

    #[tokio::test]
    async fn test_dispatch_queue_boundaries_broadcast_nothing() {
        let state = state(None);
        let (host, mut host_peer) = joined(&state, "r1", Role::Host).await;
        host.bind_identity(user("alice")).unwrap();

        // Empty queue: both directions are no-ops.
        dispatch(&host, &state, Event::Next { song: None }).await.unwrap();
        dispatch(&host, &state, Event::Previous { song: None }).await.unwrap();

        state.registry.add_track(&rid("r1"), Track::new("A", "a")).await;
        dispatch(&host, &state, Event::Next { song: None }).await.unwrap();
        dispatch(&host, &state, Event::Previous { song: None }).await.unwrap();

        assert!(drained(&mut host_peer).is_empty());
        assert_eq!(
            state.registry.current_track(&rid("r1")).await,
            Some(Track::new("A", "a"))
        );
    }

    #[tokio::test]
    async fn test_dispatch_host_add_to_queue_requires_track_id() {
        let state = state(None);
        let (host, mut host_peer) = joined(&state, "r1", Role::Host).await;
        host.bind_identity(user("alice")).unwrap();

        dispatch(&host, &state, Event::AddToQueue { song: Track::new("No id", "") })
            .await
            .unwrap();

        assert!(drained(&mut host_peer).is_empty());
        assert!(state.registry.current_track(&rid("r1")).await.is_none());
    }

    #[tokio::test]
    async fn test_dispatch_play_and_pause_echo_without_state_change() {
        let state = state(None);
        let (host, mut host_peer) = joined(&state, "r1", Role::Host).await;
        let (_listener, mut listener_peer) = joined(&state, "r1", Role::Listener).await;
        host.bind_identity(user("alice")).unwrap();

        dispatch(&host, &state, Event::Play {}).await.unwrap();
        dispatch(&host, &state, Event::Pause {}).await.unwrap();

        let expected = vec![Event::Play {}, Event::Pause {}];
        assert_eq!(drained(&mut host_peer), expected);
        assert_eq!(drained(&mut listener_peer), expected);
        assert_eq!(state.registry.room_info(&rid("r1")).await.unwrap().queue_len, 0);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_and_repeat_auth_are_ignored() {
        let state = state(None);
        let (host, mut host_peer) = joined(&state, "r1", Role::Host).await;
        host.bind_identity(user("alice")).unwrap();

        dispatch(&host, &state, Event::Unknown).await.unwrap();
        dispatch(&host, &state, Event::Auth { token: "bob-token".into() })
            .await
            .unwrap();

        assert!(drained(&mut host_peer).is_empty());
        assert_eq!(host.identity(), Some(&user("alice")));
    }

    #[tokio::test]
    async fn test_dispatch_after_close_stops_the_loop() {
        let state = state(None);
        let (host, _host_peer) = joined(&state, "r1", Role::Host).await;
        let (_listener, mut listener_peer) = joined(&state, "r1", Role::Listener).await;
        host.bind_identity(user("alice")).unwrap();
        // What eviction does to a member whose write failed.
        host.close().await;

        for event in [
            Event::AddToQueue { song: Track::new("A", "a") },
            Event::Next { song: None },
            Event::Play {},
        ] {
            assert_eq!(dispatch(&host, &state, event).await.unwrap(), Flow::Close);
        }

        assert!(state.registry.current_track(&rid("r1")).await.is_none());
        assert!(drained(&mut listener_peer).is_empty());
    }

    #[tokio::test]
    async fn test_undelivered_auth_success_is_never_announced() {
        let state = state(None);
        let (host, mut host_peer) = joined(&state, "r1", Role::Host).await;
        host.bind_identity(user("alice")).unwrap();
        let (guest, guest_peer) = joined(&state, "r1", Role::Listener).await;
        drop(guest_peer);

        let flow = dispatch(&guest, &state, Event::Auth { token: "bob-token".into() })
            .await
            .unwrap();
        assert_eq!(flow, Flow::Close);
        assert!(!guest.is_authenticated());

        teardown(&guest, &state).await;
        // Neither user_joined nor user_left for bob.
        assert!(drained(&mut host_peer).is_empty());
        assert_eq!(state.registry.member_count(&rid("r1")).await, 1);
    }
}
