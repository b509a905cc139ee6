//! Error types for the session layer.

use vybe_transport::ConnectionId;

/// Errors that can occur while establishing a session's identity.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The credential was invalid, expired, or rejected by the
    /// [`IdentityVerifier`](crate::IdentityVerifier).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The session already has an identity; identities are bound once.
    #[error("session {0} is already authenticated")]
    AlreadyAuthenticated(ConnectionId),
}
