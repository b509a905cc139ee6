//! Connection sessions for Vybe.
//!
//! This crate covers what the hub knows about a single participant:
//!
//! 1. **Session** — the connection, its fixed room and role, and the
//!    write-once identity ([`Session`], [`SessionState`])
//! 2. **Identity verification** — the seam to the external verifier that
//!    turns a bearer token into an [`Identity`](vybe_protocol::Identity)
//!    ([`IdentityVerifier`], and [`JwtVerifier`] with the `jwt` feature)
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)     ← holds sessions as room members
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Transport + Protocol (below)
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
#[cfg(feature = "jwt")]
mod jwt;
mod session;

pub use auth::IdentityVerifier;
pub use error::SessionError;
#[cfg(feature = "jwt")]
pub use jwt::JwtVerifier;
pub use session::{Session, SessionState};
