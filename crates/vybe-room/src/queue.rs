//! Playback queue: an append-only track list with a cursor.
//!
//! The whole playback state is `(tracks, cursor)`:
//!
//! ```text
//!   cursor = None ──(push)──→ cursor = Some(0) ──(advance/retreat)──→ Some(i)
//! ```
//!
//! Invariants:
//! - `cursor` is `None` exactly when the queue is empty
//! - `cursor < tracks.len()` whenever it is `Some`
//! - tracks are never removed or reordered; insertion order is play order

use vybe_protocol::Track;

/// The ordered queue of a room and the position of the current track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackQueue {
    tracks: Vec<Track>,
    cursor: Option<usize>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a track. The first track added becomes current.
    pub fn push(&mut self, track: Track) {
        self.tracks.push(track);
        if self.cursor.is_none() {
            self.cursor = Some(0);
        }
    }

    /// Moves to the next track and returns it.
    ///
    /// Returns `None` (and leaves the cursor alone) at the end of the queue
    /// or when the queue is empty.
    pub fn advance(&mut self) -> Option<&Track> {
        let next = self.cursor? + 1;
        if next >= self.tracks.len() {
            return None;
        }
        self.cursor = Some(next);
        self.tracks.get(next)
    }

    /// Moves to the previous track and returns it.
    ///
    /// Returns `None` (and leaves the cursor alone) when already at the
    /// first track or when the queue is empty.
    pub fn retreat(&mut self) -> Option<&Track> {
        let prev = self.cursor?.checked_sub(1)?;
        self.cursor = Some(prev);
        self.tracks.get(prev)
    }

    /// The track under the cursor, if any.
    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.cursor?)
    }

    /// Index of the current track; `None` means "no current track".
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
