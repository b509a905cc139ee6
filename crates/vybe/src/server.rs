//! `VybeServer` builder and server loop.
//!
//! This is the entry point for running a Vybe hub. It ties together all
//! the layers: transport → admission → session → room.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use vybe_protocol::{Codec, JsonCodec};
use vybe_room::RoomRegistry;
use tokio::net::TcpStream;
use vybe_session::IdentityVerifier;
use vybe_transport::{Connection, Transport, WebSocketConnection, WebSocketTransport};

use crate::admission::parse_path;
use crate::handler::handle_connection;
use crate::{Config, VybeError};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Connection, V: IdentityVerifier, K: Codec> {
    pub(crate) registry: Arc<RoomRegistry<C, K>>,
    pub(crate) verifier: V,
    pub(crate) auth_timeout: Option<Duration>,
    pub(crate) handshake_timeout: Duration,
}

/// Builder for configuring and starting a Vybe server.
///
/// # Example
///
/// ```rust,no_run
/// use vybe::prelude::*;
///
/// # async fn run() -> Result<(), VybeError> {
/// let server = VybeServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(JwtVerifier::new(b"secret"))
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct VybeServerBuilder {
    bind_addr: String,
    auth_timeout: Option<Duration>,
    handshake_timeout: Duration,
}

/// How long a peer may take to complete the WebSocket upgrade.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

impl VybeServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            auth_timeout: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Starts from a loaded [`Config`]. The verifier is still passed to
    /// [`build`](Self::build).
    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .bind(&config.bind_address)
            .auth_timeout(config.auth_timeout)
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Closes connections that haven't authenticated within `timeout`.
    /// `None` (the default) lets them wait indefinitely.
    pub fn auth_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.auth_timeout = timeout;
        self
    }

    /// Drops sockets that haven't finished the WebSocket upgrade within
    /// `timeout`. Defaults to 10 seconds.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Binds the listener. Connections are accepted once
    /// [`VybeServer::run`] is called.
    pub async fn build<V: IdentityVerifier>(
        self,
        verifier: V,
    ) -> Result<VybeServer<V>, VybeError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Arc::new(RoomRegistry::new()),
            verifier,
            auth_timeout: self.auth_timeout,
            handshake_timeout: self.handshake_timeout,
        });

        Ok(VybeServer { transport, state })
    }
}

impl Default for VybeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Vybe hub.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct VybeServer<V: IdentityVerifier> {
    transport: WebSocketTransport,
    state: Arc<ServerState<WebSocketConnection, V, JsonCodec>>,
}

impl<V: IdentityVerifier> VybeServer<V> {
    /// Creates a new builder.
    pub fn builder() -> VybeServerBuilder {
        VybeServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The room registry shared by every connection.
    pub fn registry(&self) -> Arc<RoomRegistry<WebSocketConnection>> {
        Arc::clone(&self.state.registry)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), VybeError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// The loop only accepts TCP sockets. The WebSocket upgrade and
    /// everything after it run on a per-connection task, so a peer that
    /// never finishes its handshake holds up nobody else. Connections
    /// already admitted keep running after shutdown; only new connections
    /// stop being accepted.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), VybeError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Vybe server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept_stream() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "accepted TCP connection");
                        let state = Arc::clone(&self.state);
                        tokio::spawn(admit(stream, peer, state));
                    }
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
            }
        }

        self.transport.shutdown().await?;
        tracing::info!("Vybe server stopped");
        Ok(())
    }
}

/// Completes the upgrade, parses the admission path, and runs the
/// connection to completion.
async fn admit<V: IdentityVerifier>(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState<WebSocketConnection, V, JsonCodec>>,
) {
    let upgraded = tokio::time::timeout(
        state.handshake_timeout,
        WebSocketConnection::upgrade(stream, peer),
    )
    .await;
    let conn = match upgraded {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            tracing::debug!(%peer, error = %e, "WebSocket handshake failed");
            return;
        }
        Err(_) => {
            tracing::debug!(%peer, "WebSocket handshake timed out");
            return;
        }
    };

    let admission = match parse_path(conn.path()) {
        Ok(admission) => admission,
        Err(e) => {
            tracing::warn!(
                conn_id = %conn.id(),
                %peer,
                error = %e,
                "rejecting connection"
            );
            let _ = conn.close().await;
            return;
        }
    };

    if let Err(e) = handle_connection(conn, admission, state).await {
        tracing::debug!(%peer, error = %e, "connection ended with error");
    }
}
