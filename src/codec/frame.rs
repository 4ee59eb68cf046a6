//! Envelope codec: byte-exact decode and encode of data frames.
//!
//! # Example
//!
//! ```
//! use zwave_serial::codec::FrameCodec;
//! use zwave_serial::protocol::{FunctionId, MessageType};
//!
//! let codec = FrameCodec::default();
//! let raw = [0x01, 0x06, 0x01, 0x03, 0xAC, 0xFE, 0xFF, 0x56];
//!
//! let envelope = codec.decode(&raw).unwrap();
//! assert_eq!(envelope.message_type, MessageType::Response);
//! assert_eq!(envelope.function_id, FunctionId(0x03));
//! assert_eq!(envelope.payload(), &[0xAC, 0xFE, 0xFF]);
//!
//! let encoded = codec.encode(&envelope).unwrap();
//! assert_eq!(&encoded[..], &raw);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ConstantsError, EncodeError, FramingError};
use crate::message::Message;
use crate::protocol::{checksum, ControlByte, Envelope, FunctionId, MessageType, ProtocolConstants, MIN_FRAME_SIZE};

/// Codec for envelope frames.
///
/// Holds the framing constants explicitly rather than reading globals.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec {
    constants: ProtocolConstants,
}

impl FrameCodec {
    /// Create a codec with custom constants.
    ///
    /// Fails if the constants cannot describe a valid envelope.
    pub fn new(constants: ProtocolConstants) -> Result<Self, ConstantsError> {
        constants.validate()?;
        Ok(Self { constants })
    }

    /// The constants this codec frames with.
    #[inline]
    pub fn constants(&self) -> &ProtocolConstants {
        &self.constants
    }

    /// Decode a complete raw frame.
    ///
    /// Checks run in a fixed order: size, start byte, length byte, checksum,
    /// message type. The payload is copied out; `raw` is not retained.
    pub fn decode(&self, raw: &[u8]) -> Result<Envelope, FramingError> {
        let raw_len = raw.len();

        if raw_len < self.constants.min_frame_size {
            return Err(FramingError::TooShort(raw_len));
        }

        if raw_len > self.constants.max_frame_size {
            return Err(FramingError::TooLong(raw_len));
        }

        if raw[0] != self.constants.start_byte {
            return Err(FramingError::BadStart(raw[0]));
        }

        if raw[1] as usize != raw_len - 2 {
            return Err(FramingError::BadLength {
                found: raw[1],
                expected: raw_len - 2,
            });
        }

        // Size was checked above so the range errors cannot occur
        let found = raw[raw_len - 1];
        match checksum::is_valid(raw, raw_len) {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                let computed = checksum::calc(&raw[1..raw_len - 1], raw_len - 2).unwrap_or(!found);
                return Err(FramingError::BadChecksum { found, computed });
            }
        }

        let message_type = MessageType::from_byte(raw[2]).ok_or(FramingError::BadType(raw[2]))?;

        let payload = &raw[4..raw_len - 1];
        let payload_len = payload.len();

        Ok(Envelope {
            message_type,
            function_id: FunctionId(raw[3]),
            payload: if payload.is_empty() {
                None
            } else {
                Some(Bytes::copy_from_slice(payload))
            },
            payload_len,
            callback_id: None,
            checksum: found,
            valid: true,
        })
    }

    /// Encode an envelope into wire bytes, computing the checksum.
    pub fn encode(&self, envelope: &Envelope) -> Result<Bytes, EncodeError> {
        if !envelope.valid {
            return Err(EncodeError::Invalid);
        }

        let payload_len = envelope.payload_len;
        let consistent = match &envelope.payload {
            None => payload_len == 0,
            Some(payload) => payload_len > 0 && payload.len() == payload_len,
        };
        if !consistent {
            return Err(EncodeError::InconsistentPayload { payload_len });
        }

        // Header and checksum are fixed; the configured bounds only narrow
        let frame_size = payload_len + MIN_FRAME_SIZE;
        if frame_size > self.constants.max_frame_size {
            return Err(EncodeError::TooLarge(frame_size));
        }
        if frame_size < self.constants.min_frame_size {
            return Err(EncodeError::TooSmall(frame_size));
        }

        let mut buf = BytesMut::with_capacity(frame_size);
        buf.put_u8(self.constants.start_byte);
        buf.put_u8((payload_len + 3) as u8);
        buf.put_u8(envelope.message_type.as_byte());
        buf.put_u8(envelope.function_id.0);
        buf.put_slice(envelope.payload());

        let cs = checksum::calc(&buf[1..], payload_len + 3).map_err(|_| EncodeError::Invalid)?;
        buf.put_u8(cs);

        Ok(buf.freeze())
    }

    /// Encode a control byte. It is the whole frame.
    #[inline]
    pub fn encode_control(&self, control: ControlByte) -> Bytes {
        Bytes::copy_from_slice(&[control.as_byte()])
    }

    /// Encode any message of the family.
    pub fn encode_message(&self, message: &Message) -> Result<Bytes, EncodeError> {
        match message {
            Message::Control(control) => Ok(self.encode_control(*control)),
            other => match other.envelope() {
                Some(envelope) => self.encode(envelope),
                None => Err(EncodeError::Invalid),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_A: [u8; 8] = [0x01, 0x06, 0x01, 0x03, 0xAC, 0xFE, 0xFF, 0x56];

    fn codec() -> FrameCodec {
        FrameCodec::default()
    }

    #[test]
    fn test_decode_scenario_a() {
        let envelope = codec().decode(&SCENARIO_A).unwrap();

        assert_eq!(envelope.message_type, MessageType::Response);
        assert_eq!(envelope.function_id, FunctionId(0x03));
        assert_eq!(envelope.payload(), &[0xAC, 0xFE, 0xFF]);
        assert_eq!(envelope.payload_len, 3);
        assert_eq!(envelope.checksum, 0x56);
        assert!(envelope.valid);
    }

    #[test]
    fn test_decode_empty_payload() {
        let envelope = codec().decode(&[0x01, 0x03, 0x00, 0x15, 0xE9]).unwrap();

        assert_eq!(envelope.function_id, FunctionId::GET_VERSION);
        assert!(envelope.payload.is_none());
        assert_eq!(envelope.payload_len, 0);
    }

    #[test]
    fn test_decode_too_short_regardless_of_content() {
        for len in 0..5 {
            let raw = vec![0x01; len];
            assert_eq!(codec().decode(&raw), Err(FramingError::TooShort(len)));
        }
    }

    #[test]
    fn test_decode_too_long() {
        let raw = vec![0x01; 257];
        assert_eq!(codec().decode(&raw), Err(FramingError::TooLong(257)));
    }

    #[test]
    fn test_decode_bad_start() {
        let mut raw = SCENARIO_A;
        raw[0] = 0x02;
        assert_eq!(codec().decode(&raw), Err(FramingError::BadStart(0x02)));
    }

    #[test]
    fn test_decode_bad_length_even_with_valid_checksum() {
        // Length byte says 5 but the frame is 8 bytes; checksum matches the bytes
        let mut raw = SCENARIO_A;
        raw[1] = 0x05;
        raw[7] = checksum::calc(&raw[1..7], 6).unwrap();

        assert_eq!(
            codec().decode(&raw),
            Err(FramingError::BadLength { found: 0x05, expected: 6 })
        );
    }

    #[test]
    fn test_decode_bad_checksum() {
        let mut raw = SCENARIO_A;
        raw[7] = 0x00;
        assert_eq!(
            codec().decode(&raw),
            Err(FramingError::BadChecksum { found: 0x00, computed: 0x56 })
        );
    }

    #[test]
    fn test_decode_bad_type() {
        let mut raw = [0x01, 0x03, 0x02, 0x15, 0x00];
        raw[4] = checksum::calc(&raw[1..4], 3).unwrap();
        assert_eq!(codec().decode(&raw), Err(FramingError::BadType(0x02)));
    }

    #[test]
    fn test_decode_does_not_alias_input() {
        let mut raw = SCENARIO_A.to_vec();
        let envelope = codec().decode(&raw).unwrap();
        raw[4] = 0x00;
        assert_eq!(envelope.payload(), &[0xAC, 0xFE, 0xFF]);
    }

    #[test]
    fn test_encode_scenario_a() {
        let envelope = Envelope::from_parts(MessageType::Response, FunctionId(0x03), &[0xAC, 0xFE, 0xFF]);
        let encoded = codec().encode(&envelope).unwrap();
        assert_eq!(&encoded[..], &SCENARIO_A);
    }

    #[test]
    fn test_encode_invalid() {
        let mut envelope = Envelope::request(FunctionId::GET_VERSION);
        envelope.valid = false;
        assert_eq!(codec().encode(&envelope), Err(EncodeError::Invalid));
    }

    #[test]
    fn test_encode_absent_payload_with_length() {
        let mut envelope = Envelope::request(FunctionId::GET_VERSION);
        envelope.payload_len = 2;
        assert_eq!(
            codec().encode(&envelope),
            Err(EncodeError::InconsistentPayload { payload_len: 2 })
        );
    }

    #[test]
    fn test_encode_present_payload_with_zero_length() {
        let mut envelope = Envelope::from_parts(MessageType::Request, FunctionId::SEND_DATA, &[0x01]);
        envelope.payload_len = 0;
        assert_eq!(
            codec().encode(&envelope),
            Err(EncodeError::InconsistentPayload { payload_len: 0 })
        );
    }

    #[test]
    fn test_encode_too_large() {
        let envelope = Envelope::from_parts(MessageType::Request, FunctionId::SEND_DATA, &[0u8; 252]);
        assert_eq!(codec().encode(&envelope), Err(EncodeError::TooLarge(257)));
    }

    #[test]
    fn test_roundtrip_every_payload_length() {
        let codec = codec();
        for len in 0..=251usize {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 + len) as u8).collect();
            let original = Envelope::from_parts(MessageType::Request, FunctionId(0x13), &payload);

            let encoded = codec.encode(&original).unwrap();
            assert_eq!(encoded.len(), len + 5);

            let decoded = codec.decode(&encoded).unwrap();
            assert_eq!(decoded, original, "payload length {}", len);
            assert_eq!(decoded.checksum, original.compute_checksum());
        }
    }

    #[test]
    fn test_encode_control() {
        assert_eq!(&codec().encode_control(ControlByte::Ack)[..], &[0x06]);
        assert_eq!(&codec().encode_control(ControlByte::Nack)[..], &[0x15]);
        assert_eq!(&codec().encode_message(&Message::Control(ControlByte::Can)).unwrap()[..], &[0x18]);
    }

    #[test]
    fn test_custom_start_byte() {
        let codec = FrameCodec::new(ProtocolConstants {
            start_byte: 0xA5,
            ..ProtocolConstants::default()
        })
        .unwrap();
        let envelope = Envelope::request(FunctionId::GET_VERSION);

        let encoded = codec.encode(&envelope).unwrap();
        assert_eq!(encoded[0], 0xA5);
        assert_eq!(codec.decode(&encoded).unwrap(), envelope);
        assert_eq!(FrameCodec::default().decode(&encoded), Err(FramingError::BadStart(0xA5)));
    }

    #[test]
    fn test_new_rejects_unframeable_constants() {
        let oversized = ProtocolConstants {
            max_frame_size: 1000,
            ..ProtocolConstants::default()
        };
        assert_eq!(FrameCodec::new(oversized).unwrap_err(), ConstantsError::MaxTooLarge(1000));

        let empty = ProtocolConstants {
            min_frame_size: 0,
            ..ProtocolConstants::default()
        };
        assert_eq!(FrameCodec::new(empty).unwrap_err(), ConstantsError::MinTooSmall(0));

        let inverted = ProtocolConstants {
            min_frame_size: 20,
            max_frame_size: 10,
            ..ProtocolConstants::default()
        };
        assert!(FrameCodec::new(inverted).is_err());
    }

    #[test]
    fn test_narrow_bounds_keep_length_byte_consistent() {
        let codec = FrameCodec::new(ProtocolConstants {
            min_frame_size: 6,
            max_frame_size: 32,
            ..ProtocolConstants::default()
        })
        .unwrap();

        let fits = Envelope::from_parts(MessageType::Request, FunctionId::SEND_DATA, &[0x5A; 27]);
        let encoded = codec.encode(&fits).unwrap();
        assert_eq!(encoded.len(), 32);
        assert_eq!(encoded[1] as usize, encoded.len() - 2);
        assert_eq!(codec.decode(&encoded).unwrap(), fits);

        let too_large = Envelope::from_parts(MessageType::Request, FunctionId::SEND_DATA, &[0x5A; 28]);
        assert_eq!(codec.encode(&too_large), Err(EncodeError::TooLarge(33)));

        let too_small = Envelope::request(FunctionId::GET_VERSION);
        assert_eq!(codec.encode(&too_small), Err(EncodeError::TooSmall(5)));
        assert_eq!(codec.decode(&[0x01, 0x03, 0x00, 0x15, 0xE9]), Err(FramingError::TooShort(5)));
    }
}
