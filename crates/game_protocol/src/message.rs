//! Application-level message shapes.
//!
//! Every frame on the wire carries exactly one [`Message`]: a kind tag the
//! game layer dispatches on, plus an opaque payload the host never inspects.
//! The payload travels as a standard base64 string inside the JSON body.

use serde::{Deserialize, Serialize};

/// The shape of a message, understood by the game layer on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A client announces itself after opening the stream.
    Connect,
    /// A client is leaving gracefully.
    Disconnect,
    /// A client finished loading and is ready to play.
    Ready,
    /// Spawn the receiving client's own player.
    Spawn,
    /// Spawn another player on the receiving client.
    SpawnOther,
    /// Another player left the session.
    PlayerLeft,
    /// Client-to-host movement input.
    PositionUpdate,
    /// Authoritative position of the receiving client's player.
    PositionOwn,
    /// Authoritative position of another player.
    PositionOther,
    /// Any other game-defined event.
    GameEvent,
}

/// One discrete message exchanged between the host and a client.
///
/// Messages are plain values: no identity beyond their content, and never
/// mutated once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    #[serde(default, with = "payload_base64")]
    pub payload: Vec<u8>,
}

mod payload_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(de::Error::custom)
    }
}

impl Message {
    pub fn new(kind: MessageKind, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// A message with no payload, e.g. `Connect` or `Disconnect`.
    pub fn signal(kind: MessageKind) -> Self {
        Self {
            kind,
            payload: Vec::new(),
        }
    }
}
