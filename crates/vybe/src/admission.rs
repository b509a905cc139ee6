//! Admission: turning the upgrade request path into a room and a role.
//!
//! Connections arrive on `/ws/{room}/{role}`. The room segment is taken
//! verbatim (no percent-decoding); the role segment maps through
//! [`Role::from_param`]. A query string and a single trailing slash are
//! ignored.

use vybe_protocol::{Role, RoomId};

use crate::VybeError;

/// Where an admitted connection goes and what it may do there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub room_id: RoomId,
    pub role: Role,
}

/// Parses an upgrade request path.
///
/// # Errors
/// [`VybeError::Admission`] if the path isn't `/ws/{room}/{role}` with
/// both segments non-empty.
pub fn parse_path(path: &str) -> Result<Admission, VybeError> {
    let reject = || VybeError::Admission(path.to_string());

    let path = path.split_once('?').map_or(path, |(p, _)| p);
    let path = path.strip_suffix('/').unwrap_or(path);
    let rest = path.strip_prefix("/ws/").ok_or_else(reject)?;

    let mut segments = rest.split('/');
    let (Some(room), Some(role), None) =
        (segments.next(), segments.next(), segments.next())
    else {
        return Err(reject());
    };
    if role.is_empty() {
        return Err(reject());
    }

    let room_id = RoomId::new(room).map_err(|_| reject())?;
    Ok(Admission {
        room_id,
        role: Role::from_param(role),
    })
}
