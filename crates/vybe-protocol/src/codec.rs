//! Codec trait and implementations for serializing/deserializing events.
//!
//! The hub never calls `serde_json` directly: it holds something that
//! implements [`Codec`] and asks it to encode an [`Event`](crate::Event)
//! once per broadcast. Tests and embedders can swap the format without
//! touching the room or dispatcher code.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a single codec instance is shared by
/// every connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Browser clients speak JSON over text frames, so this is the codec the
/// server uses. It is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use vybe_protocol::{Codec, Event, JsonCodec, Track};
///
/// let codec = JsonCodec;
/// let event = Event::AddToQueue {
///     song: Track::new("Intro", "GlvAH57aSpA"),
/// };
///
/// let bytes = codec.encode(&event).unwrap();
/// let decoded: Event = codec.decode(&bytes).unwrap();
/// assert_eq!(event, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::Event;

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<Event, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_missing_type_returns_decode_error() {
        let result: Result<Event, _> =
            JsonCodec.decode(br#"{"token":"abc"}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_produces_utf8_json() {
        let bytes = JsonCodec.encode(&Event::Pause {}).unwrap();
        let text = std::str::from_utf8(&bytes).expect("utf-8");
        assert_eq!(text, r#"{"type":"pause"}"#);
    }
}
