//! Identity verification hook for the auth handshake.
//!
//! The hub doesn't issue or check credentials itself. It defines the
//! [`IdentityVerifier`] trait: one async method that takes the bearer token
//! from an `auth` event and returns an [`Identity`] or an error. The
//! dispatcher calls it exactly once per successful handshake.
//!
//! Implementations in this crate:
//! - [`JwtVerifier`](crate::JwtVerifier) (feature `jwt`) — shared-secret HMAC JWTs
//!
//! Tests typically provide their own verifier that maps fixed tokens to
//! fixed identities.

use std::future::Future;

use vybe_protocol::Identity;

use crate::SessionError;

/// Turns a bearer credential into a user identity, or rejects it.
///
/// `Send + Sync + 'static` because one verifier is shared by every
/// connection task for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use vybe_protocol::Identity;
/// use vybe_session::{IdentityVerifier, SessionError};
///
/// /// Treats the token as the user's name. Development only.
/// struct NameIsToken;
///
/// impl IdentityVerifier for NameIsToken {
///     async fn verify(&self, token: &str) -> Result<Identity, SessionError> {
///         if token.is_empty() {
///             return Err(SessionError::AuthFailed("empty token".into()));
///         }
///         Ok(Identity {
///             id: token.to_string(),
///             name: token.to_string(),
///             ..Identity::default()
///         })
///     }
/// }
/// ```
pub trait IdentityVerifier: Send + Sync + 'static {
    /// Validates `token` and returns who it belongs to.
    ///
    /// # Returns
    /// - `Ok(Identity)` — the credential is valid
    /// - `Err(SessionError::AuthFailed)` — invalid, expired, or malformed
    fn verify(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Identity, SessionError>> + Send;
}
