//! Unified error type for the Vybe hub.

use vybe_protocol::ProtocolError;
use vybe_room::RoomError;
use vybe_session::SessionError;
use vybe_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum VybeError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Identity verification or binding failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The environment did not describe a usable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A write to a single connection failed.
    #[error("connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The connection path did not name a room and role.
    #[error("rejected admission for path {0:?}")]
    Admission(String),
}
