//! Core protocol types for Vybe's wire format.
//!
//! Every value here either travels on the wire as JSON or is fixed when a
//! connection is admitted (room and role).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A verified user identity.
///
/// Produced once by the identity verifier during the auth handshake and
/// never modified afterwards. All fields are opaque strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.id)
    }
}

/// Identifier of a room, taken verbatim from the connection path.
///
/// Serialized as a bare string (`#[serde(transparent)]`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Creates a room identifier.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` for an empty identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, ProtocolError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "room id must not be empty".into(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// The role a session was admitted with. Fixed for the connection's life.
///
/// Only a [`Role::Host`] may mutate a room's queue or playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    Host,
    #[default]
    Listener,
}

impl Role {
    /// Maps the role segment of the connection path to a role.
    ///
    /// `"host"` is the only value that grants host authority; anything
    /// else (`"guest"`, `"listener"`, typos) is a listener.
    pub fn from_param(param: &str) -> Self {
        if param == "host" {
            Role::Host
        } else {
            Role::Listener
        }
    }

    pub fn is_host(self) -> bool {
        matches!(self, Role::Host)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Host => f.write_str("host"),
            Role::Listener => f.write_str("listener"),
        }
    }
}

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

/// A reference to a playable track.
///
/// On the wire: `{"title": "...", "videoID": "..."}`. The capitalised
/// names `Title` / `VideoID` are accepted on input for older clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Track {
    #[serde(default, alias = "Title")]
    pub title: String,

    /// Catalog identifier used to fetch the audio.
    #[serde(default, rename = "videoID", alias = "VideoID")]
    pub track_id: String,
}

impl Track {
    pub fn new(title: impl Into<String>, track_id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            track_id: track_id.into(),
        }
    }

    /// A track without an identifier can't be played and is never queued.
    pub fn is_empty(&self) -> bool {
        self.track_id.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Every message exchanged between clients and the hub.
///
/// Internally tagged on `"type"`, so `Event::Auth { token }` is
/// `{"type":"auth","token":"..."}` on the wire. Each variant carries only
/// the fields meaningful for it.
///
/// Unknown `type` values decode to [`Event::Unknown`] rather than failing,
/// so newer clients can send events this hub ignores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Client → hub, before authentication: present a bearer credential.
    #[serde(rename = "auth")]
    Auth {
        #[serde(default)]
        token: String,
    },

    /// Hub → authenticating client: the handshake succeeded.
    #[serde(rename = "auth_success")]
    AuthSuccess {
        user: Identity,
        #[serde(rename = "isHost")]
        is_host: bool,
    },

    /// Hub → room: a member finished authenticating.
    #[serde(rename = "user_joined")]
    UserJoined { user: Identity },

    /// Hub → room: an authenticated member disconnected.
    #[serde(rename = "user_left")]
    UserLeft { user: Identity },

    /// Hub → room: the full roster of authenticated members.
    #[serde(rename = "all_users")]
    AllUsers { users: Vec<Identity> },

    /// Host → hub, echoed to the room: append a track to the queue.
    #[serde(rename = "addToQueue")]
    AddToQueue {
        #[serde(default)]
        song: Track,
    },

    /// Host → hub: advance. Hub → room: the new current track.
    #[serde(rename = "next")]
    Next {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        song: Option<Track>,
    },

    /// Host → hub: go back. Hub → room: the new current track.
    #[serde(rename = "previous")]
    Previous {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        song: Option<Track>,
    },

    /// Host → hub, echoed to the room.
    #[serde(rename = "play")]
    Play {},

    /// Host → hub, echoed to the room.
    #[serde(rename = "pause")]
    Pause {},

    /// Hub → client: the connection is being rejected.
    #[serde(rename = "error")]
    Error { code: u16, message: String },

    /// Any `type` this hub doesn't recognise.
    #[serde(other)]
    Unknown,
}

impl Event {
    /// The wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Auth { .. } => "auth",
            Event::AuthSuccess { .. } => "auth_success",
            Event::UserJoined { .. } => "user_joined",
            Event::UserLeft { .. } => "user_left",
            Event::AllUsers { .. } => "all_users",
            Event::AddToQueue { .. } => "addToQueue",
            Event::Next { .. } => "next",
            Event::Previous { .. } => "previous",
            Event::Play {} => "play",
            Event::Pause {} => "pause",
            Event::Error { .. } => "error",
            Event::Unknown => "unknown",
        }
    }

    /// Builds the rejection sent before closing an unauthenticated connection.
    pub fn unauthorized() -> Self {
        Event::Error {
            code: 401,
            message: "unauthorized".into(),
        }
    }
}
