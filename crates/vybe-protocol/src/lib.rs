//! Wire protocol for Vybe.
//!
//! This crate defines what clients and the hub say to each other:
//!
//! - **Types** ([`Event`], [`Identity`], [`Track`], [`RoomId`], [`Role`]) —
//!   the values that travel on the wire or are fixed at admission.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how events are turned
//!   into bytes and back.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while doing so.
//!
//! The protocol layer knows nothing about connections or rooms:
//!
//! ```text
//! Transport (bytes) → Protocol (Event) → Session / Room
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{Event, Identity, Role, RoomId, Track};
