//! Wire packets and codec
//!
//! Each frame on the chat characteristic is one UTF-8 JSON object with a
//! required `type` discriminator:
//!
//! ```json
//! {"type": "message", "content": "hello"}
//! {"type": "typing",  "content": true}
//! ```
//!
//! Exactly two tags are defined. Unknown tags decode to a distinct error so
//! callers can drop the frame without tearing down the connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::PacketError;

// ----------------------------------------------------------------------------
// Packet Tags
// ----------------------------------------------------------------------------

/// Discriminator for chat message frames.
pub const TAG_MESSAGE: &str = "message";

/// Discriminator for typing status frames.
pub const TAG_TYPING: &str = "typing";

// ----------------------------------------------------------------------------
// Packet
// ----------------------------------------------------------------------------

/// Application-level packet exchanged over the chat characteristic.
///
/// Transient: only `Message` frames ever produce a stored record, and that
/// record is created by the session, never by the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// A chat message carrying user text.
    Message { content: String },
    /// The remote user's typing status.
    Typing { active: bool },
}

/// On-the-wire frame shape shared by every packet kind.
#[derive(Debug, Serialize, Deserialize)]
struct WireFrame {
    #[serde(rename = "type")]
    tag: String,
    content: Value,
}

impl Packet {
    /// Encode to the wire representation.
    ///
    /// Deterministic and round-trips through [`Packet::decode`].
    pub fn encode(&self) -> Vec<u8> {
        let frame = match self {
            Packet::Message { content } => WireFrame {
                tag: TAG_MESSAGE.to_string(),
                content: Value::String(content.clone()),
            },
            Packet::Typing { active } => WireFrame {
                tag: TAG_TYPING.to_string(),
                content: Value::Bool(*active),
            },
        };
        serde_json::to_vec(&frame).expect("a two-field frame of scalars serializes infallibly")
    }

    /// Decode one wire frame.
    ///
    /// Invalid UTF-8, malformed JSON, an unrecognized tag, and a recognized
    /// tag with the wrong content type are all distinct failures. Every one
    /// of them is recoverable: drop the frame, keep the connection.
    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        let text = core::str::from_utf8(bytes)?;
        let frame: WireFrame = serde_json::from_str(text)?;
        match frame.tag.as_str() {
            TAG_MESSAGE => match frame.content {
                Value::String(content) => Ok(Packet::Message { content }),
                other => Err(PacketError::ContentType {
                    tag: TAG_MESSAGE,
                    expected: "string",
                    found: json_kind(&other),
                }),
            },
            TAG_TYPING => match frame.content {
                Value::Bool(active) => Ok(Packet::Typing { active }),
                other => Err(PacketError::ContentType {
                    tag: TAG_TYPING,
                    expected: "boolean",
                    found: json_kind(&other),
                }),
            },
            _ => Err(PacketError::UnknownTag { tag: frame.tag }),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
