//! Envelope struct with typed accessors.
//!
//! Represents one decoded (or to-be-encoded) data frame. The payload uses
//! `bytes::Bytes` so replies can be handed to several owners without copying.
//!
//! # Example
//!
//! ```
//! use zwave_serial::protocol::{Envelope, FunctionId, MessageType};
//! use bytes::Bytes;
//!
//! let envelope = Envelope::new(
//!     MessageType::Request,
//!     FunctionId::SEND_DATA,
//!     Bytes::from_static(&[0x02, 0x01, 0x00, 0x25, 0x0A]),
//! );
//!
//! assert_eq!(envelope.function_id, FunctionId::SEND_DATA);
//! assert_eq!(envelope.payload(), &[0x02, 0x01, 0x00, 0x25, 0x0A]);
//! assert!(envelope.valid);
//! ```

use bytes::Bytes;
use serde::Serialize;

use super::constants::{FunctionId, MessageType, CHECKSUM_SEED, MIN_FRAME_SIZE};

/// A data frame: everything between SOF and the checksum, plus the checksum.
///
/// Fields are public so that partially built values can exist; the codec
/// refuses to encode any that are not internally consistent. Serializes as a
/// plain record of those fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    /// Request or response.
    pub message_type: MessageType,
    /// Which command or reply this frame carries.
    pub function_id: FunctionId,
    /// Payload bytes, `None` when the frame carries none.
    pub payload: Option<Bytes>,
    /// Declared payload length.
    pub payload_len: usize,
    /// Trailing correlation byte, when a message variant knows it has one.
    pub callback_id: Option<u8>,
    /// Checksum as received, or as computed for the encoded form.
    pub checksum: u8,
    /// Set once the frame passed validation.
    pub valid: bool,
}

impl Envelope {
    /// Build a valid envelope. An empty payload is stored as `None`.
    pub fn new(message_type: MessageType, function_id: FunctionId, payload: Bytes) -> Self {
        let payload_len = payload.len();
        let payload = if payload.is_empty() { None } else { Some(payload) };

        let mut envelope = Self {
            message_type,
            function_id,
            payload,
            payload_len,
            callback_id: None,
            checksum: 0,
            valid: true,
        };
        envelope.checksum = envelope.compute_checksum();
        envelope
    }

    /// Build a valid envelope from a borrowed payload (copies data).
    pub fn from_parts(message_type: MessageType, function_id: FunctionId, payload: &[u8]) -> Self {
        Self::new(message_type, function_id, Bytes::copy_from_slice(payload))
    }

    /// Request with no payload.
    pub fn request(function_id: FunctionId) -> Self {
        Self::new(MessageType::Request, function_id, Bytes::new())
    }

    /// Payload bytes, empty when absent.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or(&[])
    }

    /// Cheap clone of the payload.
    #[inline]
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone().unwrap_or_default()
    }

    #[inline]
    pub fn is_request(&self) -> bool {
        self.message_type == MessageType::Request
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        self.message_type == MessageType::Response
    }

    /// Size of this envelope on the wire.
    #[inline]
    pub fn frame_size(&self) -> usize {
        self.payload_len + MIN_FRAME_SIZE
    }

    /// Length byte as it appears on the wire (frame size − 2).
    #[inline]
    pub fn length_byte(&self) -> usize {
        self.payload_len + 3
    }

    /// Checksum the encoded form of this envelope would carry.
    pub fn compute_checksum(&self) -> u8 {
        let header = [
            self.length_byte() as u8,
            self.message_type.as_byte(),
            self.function_id.0,
        ];
        header
            .iter()
            .chain(self.payload())
            .fold(CHECKSUM_SEED, |cs, b| cs ^ b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_with_payload() {
        let envelope = Envelope::from_parts(MessageType::Response, FunctionId(0x03), &[0xAC, 0xFE, 0xFF]);

        assert_eq!(envelope.message_type, MessageType::Response);
        assert_eq!(envelope.function_id, FunctionId(0x03));
        assert_eq!(envelope.payload(), &[0xAC, 0xFE, 0xFF]);
        assert_eq!(envelope.payload_len, 3);
        assert_eq!(envelope.frame_size(), 8);
        assert_eq!(envelope.length_byte(), 6);
        assert_eq!(envelope.checksum, 0x56);
        assert!(envelope.valid);
        assert!(envelope.is_response());
    }

    #[test]
    fn test_empty_payload_is_none() {
        let envelope = Envelope::request(FunctionId::GET_VERSION);

        assert!(envelope.payload.is_none());
        assert_eq!(envelope.payload_len, 0);
        assert!(envelope.payload().is_empty());
        assert!(envelope.payload_bytes().is_empty());
        assert!(envelope.is_request());
        // 0xFF ^ 0x03 ^ 0x00 ^ 0x15
        assert_eq!(envelope.checksum, 0xE9);
    }

    #[test]
    fn test_payload_bytes_zero_copy() {
        let original = Bytes::from_static(b"zero copy");
        let envelope = Envelope::new(MessageType::Request, FunctionId::SEND_DATA, original.clone());

        assert_eq!(envelope.payload_bytes().as_ptr(), original.as_ptr());
    }

    #[test]
    fn test_serializes_as_record() {
        let envelope = Envelope::from_parts(MessageType::Response, FunctionId(0x03), &[0xAC, 0xFE, 0xFF]);

        let record = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            record,
            serde_json::json!({
                "message_type": "Response",
                "function_id": 3,
                "payload": [0xAC, 0xFE, 0xFF],
                "payload_len": 3,
                "callback_id": null,
                "checksum": 0x56,
                "valid": true,
            })
        );

        let empty = serde_json::to_value(Envelope::request(FunctionId::GET_VERSION)).unwrap();
        assert_eq!(empty["payload"], serde_json::Value::Null);
        assert_eq!(empty["payload_len"], 0);
    }
}
