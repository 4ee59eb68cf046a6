//! Message module - the decoded message family and its registry.
//!
//! Provides:
//! - [`Message`] - closed union of control bytes and envelope-based messages
//! - [`MessageRegistry`] - maps function ids to message constructors
//! - [`VersionReply`] - the fully interpreted GET_VERSION reply
//!
//! # Example
//!
//! ```
//! use zwave_serial::codec::FrameCodec;
//! use zwave_serial::message::{Message, MessageRegistry};
//!
//! let registry = MessageRegistry::standard();
//! let codec = FrameCodec::default();
//!
//! let mut raw = vec![0x01, 0x0F, 0x01, 0x15];
//! raw.extend_from_slice(b"111111111111");
//! raw.push(zwave_serial::protocol::checksum::calc(&raw[1..], 15).unwrap());
//!
//! let envelope = codec.decode(&raw).unwrap();
//! match registry.build(envelope).unwrap() {
//!     Message::Version(reply) => assert_eq!(reply.controller_version(), "111111111111"),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

mod registry;
mod version;

pub use registry::{MessageParser, MessageRegistry, OpaqueParser, TypedParser};
pub use version::{VersionReply, VERSION_LEN, VERSION_MAX_PAYLOAD};

use serde::Serialize;

use crate::error::PayloadError;
use crate::protocol::{ControlByte, Envelope, FunctionId, MessageType};

/// Construct a concrete message type from a decoded envelope.
pub trait FromEnvelope: Sized {
    fn from_envelope(envelope: Envelope) -> Result<Self, PayloadError>;
}

/// Every message that can cross the link.
///
/// Serializes externally tagged, e.g. `{"control":"Ack"}` or
/// `{"opaque":{"function_id":73,...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    /// Single-byte ACK/NACK/CAN; no envelope at all.
    Control(ControlByte),
    /// GET_VERSION with its payload interpreted.
    Version(VersionReply),
    /// Known function id whose payload is not interpreted (yet).
    Opaque(Envelope),
}

impl Message {
    pub fn ack() -> Self {
        Self::Control(ControlByte::Ack)
    }

    pub fn nack() -> Self {
        Self::Control(ControlByte::Nack)
    }

    pub fn can() -> Self {
        Self::Control(ControlByte::Can)
    }

    /// The envelope, unless this is a control byte.
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Self::Control(_) => None,
            Self::Version(reply) => Some(reply.envelope()),
            Self::Opaque(envelope) => Some(envelope),
        }
    }

    pub fn function_id(&self) -> Option<FunctionId> {
        self.envelope().map(|e| e.function_id)
    }

    pub fn message_type(&self) -> Option<MessageType> {
        self.envelope().map(|e| e.message_type)
    }

    pub fn callback_id(&self) -> Option<u8> {
        self.envelope().and_then(|e| e.callback_id)
    }

    pub fn control(&self) -> Option<ControlByte> {
        match self {
            Self::Control(control) => Some(*control),
            _ => None,
        }
    }

    #[inline]
    pub fn is_control(&self) -> bool {
        matches!(self, Self::Control(_))
    }

    /// Control bytes are always valid; envelopes carry their own flag.
    pub fn is_valid(&self) -> bool {
        self.envelope().map_or(true, |e| e.valid)
    }
}

impl From<Envelope> for Message {
    fn from(envelope: Envelope) -> Self {
        Self::Opaque(envelope)
    }
}

impl From<VersionReply> for Message {
    fn from(reply: VersionReply) -> Self {
        Self::Version(reply)
    }
}

impl From<ControlByte> for Message {
    fn from(control: ControlByte) -> Self {
        Self::Control(control)
    }
}
