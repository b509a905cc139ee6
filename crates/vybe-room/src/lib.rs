//! Rooms for Vybe: membership, the shared playback queue, and broadcast.
//!
//! # Key types
//!
//! - [`RoomRegistry`] — the hub: creates rooms on first join, drops them
//!   when the last member leaves, broadcasts events with eviction of
//!   members whose connection failed
//! - [`Room`] — one room's members and queue
//! - [`PlaybackQueue`] — the append-only queue and its cursor
//! - [`BroadcastReport`], [`RoomInfo`] — what a broadcast did, what a room holds

mod error;
mod queue;
mod registry;
mod room;

pub use error::RoomError;
pub use queue::PlaybackQueue;
pub use registry::{BroadcastReport, RoomRegistry};
pub use room::{Room, RoomInfo};
