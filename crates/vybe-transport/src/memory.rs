//! In-process connections backed by channels.
//!
//! [`pair`] returns the server side ([`MemoryConnection`], which implements
//! [`Connection`]) and the client side ([`MemoryPeer`]). Dropping the peer
//! behaves like a client vanishing: pending and future `recv` calls return
//! `None` and every `send` fails.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{mpsc, watch, Mutex};

use crate::{Connection, ConnectionId, TransportError};

static NEXT_MEMORY_ID: AtomicU64 = AtomicU64::new(1 << 32);

/// Creates a connected server/client pair.
pub fn pair() -> (MemoryConnection, MemoryPeer) {
    let (to_client, from_server) = mpsc::unbounded_channel();
    let (to_server, from_client) = mpsc::unbounded_channel();
    let (closed_tx, closed_rx) = watch::channel(false);

    let conn = MemoryConnection {
        id: ConnectionId::new(NEXT_MEMORY_ID.fetch_add(1, Ordering::Relaxed)),
        outbound: to_client,
        inbound: Mutex::new(from_client),
        closed: closed_tx,
        close_calls: AtomicUsize::new(0),
    };
    let peer = MemoryPeer {
        to_server,
        from_server,
        closed: closed_rx,
    };
    (conn, peer)
}

/// Server side of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: watch::Sender<bool>,
    close_calls: AtomicUsize,
}

impl MemoryConnection {
    /// How many times [`close`](Connection::close) has been called.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        if *self.closed.borrow() {
            return Err(TransportError::ConnectionClosed(format!(
                "{} closed locally",
                self.id
            )));
        }
        self.outbound.send(data.to_vec()).map_err(|_| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "peer dropped",
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            msg = inbound.recv() => Ok(msg),
            _ = closed.wait_for(|c| *c) => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.send_replace(true);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Client side of an in-memory connection.
pub struct MemoryPeer {
    to_server: mpsc::UnboundedSender<Vec<u8>>,
    from_server: mpsc::UnboundedReceiver<Vec<u8>>,
    closed: watch::Receiver<bool>,
}

impl MemoryPeer {
    /// Delivers a frame to the server side.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        self.to_server.send(data.into()).map_err(|_| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "server side dropped",
            ))
        })
    }

    /// Waits for the next frame from the server. `None` once the server
    /// side is gone and every buffered frame has been read.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.from_server.recv().await
    }

    /// Returns a frame the server already sent, without waiting.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.from_server.try_recv().ok()
    }

    /// Drains every frame the server already sent.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Whether the server side has closed the connection.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Waits until the server side closes the connection.
    pub async fn closed(&mut self) {
        let _ = self.closed.wait_for(|c| *c).await;
    }
}
