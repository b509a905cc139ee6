//! # Vybe
//!
//! Real-time listening rooms over WebSocket.
//!
//! A host and any number of listeners connect to the same room, prove who
//! they are with a bearer token, and share one playback queue. Only the
//! host may change the queue or the play state; every change is broadcast
//! to the whole room in order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vybe::prelude::*;
//!
//! # async fn start() -> Result<(), VybeError> {
//! let config = Config::from_env()?;
//! let server = VybeServerBuilder::from_config(&config)
//!     .build(JwtVerifier::new(config.jwt_secret.as_bytes()))
//!     .await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```
//!
//! Clients connect to `/ws/{room}/{role}` and send
//! `{"type":"auth","token":"..."}` before anything else.

mod admission;
mod config;
mod error;
mod handler;
mod server;

pub use admission::{parse_path, Admission};
pub use config::{Config, ConfigError};
pub use error::VybeError;
pub use server::{VybeServer, VybeServerBuilder};

pub mod prelude {
    pub use crate::{Admission, Config, ConfigError, VybeError, VybeServer, VybeServerBuilder};
    pub use vybe_protocol::{Codec, Event, Identity, JsonCodec, Role, RoomId, Track};
    pub use vybe_room::{BroadcastReport, PlaybackQueue, RoomError, RoomInfo, RoomRegistry};
    pub use vybe_session::{IdentityVerifier, JwtVerifier, SessionError};
    pub use vybe_transport::TransportError;
}
