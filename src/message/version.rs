//! GET_VERSION (0x15) message.
//!
//! The controller answers a payload-less request with a 12-byte ASCII
//! library version string, optionally followed by a callback id.

use bytes::{BufMut, BytesMut};
use serde::Serialize;

use super::FromEnvelope;
use crate::error::PayloadError;
use crate::protocol::{Envelope, FunctionId, MessageType};

/// Length of the controller version string.
pub const VERSION_LEN: usize = 12;

/// Version string plus the optional trailing callback id.
pub const VERSION_MAX_PAYLOAD: usize = VERSION_LEN + 1;

/// Decoded GET_VERSION reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionReply {
    envelope: Envelope,
    controller_version: String,
}

impl VersionReply {
    /// Interpret an already decoded envelope as a version reply.
    ///
    /// The envelope may have decoded cleanly and still be rejected here.
    pub fn parse(mut envelope: Envelope) -> Result<Self, PayloadError> {
        let payload = envelope.payload();
        let len = payload.len();

        if len < VERSION_LEN {
            return Err(PayloadError::TooSmall {
                len,
                min: VERSION_LEN,
            });
        }

        if len > VERSION_MAX_PAYLOAD {
            return Err(PayloadError::UnexpectedTrailingData {
                len,
                max: VERSION_MAX_PAYLOAD,
            });
        }

        let controller_version = String::from_utf8_lossy(&payload[..VERSION_LEN]).into_owned();
        let callback_id = payload.get(VERSION_LEN).copied();

        envelope.callback_id = callback_id;

        Ok(Self {
            envelope,
            controller_version,
        })
    }

    /// Build a version response, e.g. for a simulated controller.
    pub fn new(controller_version: &str, callback_id: Option<u8>) -> Result<Self, PayloadError> {
        let version = controller_version.as_bytes();
        if version.len() != VERSION_LEN {
            return Err(PayloadError::BadVersionLength(version.len()));
        }

        let mut payload = BytesMut::with_capacity(VERSION_MAX_PAYLOAD);
        payload.put_slice(version);
        if let Some(id) = callback_id {
            payload.put_u8(id);
        }

        let mut envelope = Envelope::new(
            MessageType::Response,
            FunctionId::GET_VERSION,
            payload.freeze(),
        );
        envelope.callback_id = callback_id;

        Ok(Self {
            envelope,
            controller_version: controller_version.to_string(),
        })
    }

    /// The payload-less request the host sends.
    pub fn request() -> Envelope {
        Envelope::request(FunctionId::GET_VERSION)
    }

    #[inline]
    pub fn controller_version(&self) -> &str {
        &self.controller_version
    }

    #[inline]
    pub fn callback_id(&self) -> Option<u8> {
        self.envelope.callback_id
    }

    #[inline]
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn into_envelope(self) -> Envelope {
        self.envelope
    }
}

impl FromEnvelope for VersionReply {
    fn from_envelope(envelope: Envelope) -> Result<Self, PayloadError> {
        Self::parse(envelope)
    }
}
