//! Error types for the room layer.

use vybe_protocol::{ProtocolError, RoomId};

/// Errors that can occur during room operations.
///
/// Membership and queue operations never fail: joining creates the room,
/// leaving an unknown room is a no-op, and queue boundaries are reported
/// as `None` rather than errors.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The event could not be encoded for broadcast.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
