//! Control-plane messages exchanged over the voice signaling websocket.
//!
//! Every frame is a JSON object of the form `{"op": <u8>, "d": <data>}`. A
//! [`Payload`] keeps the data block opaque until a handler asks for it as a
//! concrete type via [`Payload::data`].

mod close_code;
pub mod payload;
mod speaking_state;

pub use self::{close_code::CloseCode, speaking_state::SpeakingState};

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Error as JsonError, Value};
use std::fmt;

/// Opcodes used on the voice signaling channel.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Opcode {
    /// Begin a voice session (client → server).
    Identify,
    /// Choose the transport, address and encryption mode (client → server).
    SelectProtocol,
    /// Session accepted: SSRC, media endpoint and offered modes (server → client).
    Ready,
    /// Keepalive nonce (client → server).
    Heartbeat,
    /// Encryption mode and secret key (server → client).
    SessionDescription,
    /// Speaking state, in both directions.
    Speaking,
    /// Keepalive acknowledgement (server → client).
    HeartbeatAck,
    /// Resume a dropped session (client → server).
    Resume,
    /// Heartbeat interval for this session (server → client).
    Hello,
    /// Session resumed (server → client).
    Resumed,
    /// Another client joined the call (server → client).
    ClientConnect,
    /// Another client left the call (server → client).
    ClientDisconnect,
    /// Any opcode this library does not handle.
    Unknown(u8),
}

impl Opcode {
    /// Whether this opcode only makes sense as a reply to a handshake step.
    ///
    /// Receiving one of these out of turn aborts the handshake.
    pub(crate) fn is_handshake_reply(self) -> bool {
        matches!(
            self,
            Opcode::Hello | Opcode::Ready | Opcode::SessionDescription | Opcode::Resumed
        )
    }
}

impl From<u8> for Opcode {
    fn from(op: u8) -> Self {
        use Opcode::*;
        match op {
            0 => Identify,
            1 => SelectProtocol,
            2 => Ready,
            3 => Heartbeat,
            4 => SessionDescription,
            5 => Speaking,
            6 => HeartbeatAck,
            7 => Resume,
            8 => Hello,
            9 => Resumed,
            12 => ClientConnect,
            13 => ClientDisconnect,
            other => Unknown(other),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> Self {
        use Opcode::*;
        match op {
            Identify => 0,
            SelectProtocol => 1,
            Ready => 2,
            Heartbeat => 3,
            SessionDescription => 4,
            Speaking => 5,
            HeartbeatAck => 6,
            Resume => 7,
            Hello => 8,
            Resumed => 9,
            ClientConnect => 12,
            ClientDisconnect => 13,
            Unknown(other) => other,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op{}/{:?}", u8::from(*self), self)
    }
}

/// A typed payload body which is sent to the voice server.
pub trait Outgoing: Serialize {
    /// The opcode this body is sent under.
    const OPCODE: Opcode;
}

/// A single control message: an opcode and its (undecoded) data block.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
    /// Message type.
    pub op: Opcode,
    /// Message body, decoded on demand.
    pub d: Value,
}

impl Payload {
    /// Creates a payload from an opcode and an opaque data block.
    pub fn new(op: Opcode, d: Value) -> Self {
        Self { op, d }
    }

    /// Serializes a typed outgoing body under its opcode.
    pub fn from_data<T: Outgoing>(data: &T) -> Result<Self, JsonError> {
        Ok(Self {
            op: T::OPCODE,
            d: serde_json::to_value(data)?,
        })
    }

    /// Decodes the data block as a concrete payload body.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, JsonError> {
        T::deserialize(&self.d)
    }
}

#[derive(Deserialize, Serialize)]
struct RawPayload {
    op: u8,
    #[serde(default)]
    d: Value,
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawPayload {
            op: self.op.into(),
            d: self.d.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawPayload::deserialize(deserializer)?;
        Ok(Self {
            op: raw.op.into(),
            d: raw.d,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{payload::*, *};
    use serde_json::json;

    #[test]
    fn opcodes_map_both_ways() {
        for raw in 0u8..=20 {
            assert_eq!(u8::from(Opcode::from(raw)), raw);
        }
        assert_eq!(Opcode::from(8), Opcode::Hello);
        assert_eq!(Opcode::from(42), Opcode::Unknown(42));
    }

    #[test]
    fn payload_decodes_hello() {
        let p: Payload =
            serde_json::from_str(r#"{"op":8,"d":{"v":4,"heartbeat_interval":41250.0}}"#).unwrap();
        assert_eq!(p.op, Opcode::Hello);

        let hello: Hello = p.data().unwrap();
        assert!((hello.heartbeat_interval - 41_250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn heartbeat_serializes_bare_nonce() {
        let p = Payload::from_data(&Heartbeat { nonce: 7 }).unwrap();
        assert_eq!(serde_json::to_value(&p).unwrap(), json!({"op": 3, "d": 7}));
    }

    #[test]
    fn unknown_opcodes_keep_their_data() {
        let p: Payload = serde_json::from_str(r#"{"op":18,"d":{"any":1}}"#).unwrap();
        assert_eq!(p.op, Opcode::Unknown(18));
        assert_eq!(p.d, json!({"any": 1}));
    }

    #[test]
    fn missing_data_block_is_null() {
        let p: Payload = serde_json::from_str(r#"{"op":9}"#).unwrap();
        assert_eq!(p.op, Opcode::Resumed);
        assert!(p.d.is_null());
    }
}
