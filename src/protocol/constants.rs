//! Wire constants and identifier types.
//!
//! Envelope layout:
//! ```text
//! ┌─────┬────────┬──────┬──────────┬─────────────────┬──────────┐
//! │ SOF │ Length │ Type │ Func ID  │ Payload         │ Checksum │
//! │ 0x01│ 1 byte │ 1    │ 1 byte   │ 0..251 bytes    │ 1 byte   │
//! └─────┴────────┴──────┴──────────┴─────────────────┴──────────┘
//! ```
//!
//! `Length` counts every byte after itself, i.e. frame size − 2.
//! Control bytes (ACK, NACK, CAN) travel alone, outside any envelope.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConstantsError;

/// Start-of-frame marker.
pub const SOF: u8 = 0x01;

/// Smallest valid envelope: SOF, length, type, function id, checksum.
pub const MIN_FRAME_SIZE: usize = 5;

/// Largest valid envelope.
pub const MAX_FRAME_SIZE: usize = 256;

/// Largest payload that fits in [`MAX_FRAME_SIZE`].
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - MIN_FRAME_SIZE;

/// Wire value meaning "no callback id".
pub const INVALID_CALLBACK_ID: u8 = 0xFF;

/// Initial value of the XOR checksum accumulator.
pub const CHECKSUM_SEED: u8 = 0xFF;

/// Envelope message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    Request = 0x00,
    Response = 0x01,
}

impl MessageType {
    #[inline]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Request),
            0x01 => Some(Self::Response),
            _ => None,
        }
    }

    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Single-byte link control frames.
///
/// Kept apart from [`FunctionId`]: NACK and GET_VERSION share the value
/// 0x15 but live in different namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ControlByte {
    Ack = 0x06,
    Nack = 0x15,
    Can = 0x18,
}

impl ControlByte {
    #[inline]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x06 => Some(Self::Ack),
            0x15 => Some(Self::Nack),
            0x18 => Some(Self::Can),
            _ => None,
        }
    }

    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Function id selecting the command or reply an envelope carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionId(pub u8);

impl FunctionId {
    pub const UNDEFINED: Self = Self(0xFF);
    pub const GET_INIT_DATA: Self = Self(0x02);
    pub const APPLICATION_COMMAND_HANDLER: Self = Self(0x04);
    pub const SEND_NODE_INFORMATION: Self = Self(0x12);
    pub const SEND_DATA: Self = Self(0x13);
    pub const GET_VERSION: Self = Self(0x15);
    pub const GET_NODE_PROTOCOL_INFO: Self = Self(0x41);
    pub const ASSIGN_RETURN_ROUTE: Self = Self(0x46);
    pub const REQUEST_NODE_NEIGHBOR_UPDATE: Self = Self(0x48);
    pub const APPLICATION_UPDATE: Self = Self(0x49);
    pub const REQUEST_NODE_NEIGHBOR_UPDATE_OPTIONS: Self = Self(0x5A);
    pub const REQUEST_NODE_INFO: Self = Self(0x60);
    pub const GET_ROUTING_INFO: Self = Self(0x80);
    pub const GET_ASSOCIATION: Self = Self(0x85);

    /// Every function id the protocol defines.
    pub const KNOWN: [Self; 14] = [
        Self::UNDEFINED,
        Self::GET_INIT_DATA,
        Self::APPLICATION_COMMAND_HANDLER,
        Self::SEND_NODE_INFORMATION,
        Self::SEND_DATA,
        Self::GET_VERSION,
        Self::GET_NODE_PROTOCOL_INFO,
        Self::ASSIGN_RETURN_ROUTE,
        Self::REQUEST_NODE_NEIGHBOR_UPDATE,
        Self::APPLICATION_UPDATE,
        Self::REQUEST_NODE_NEIGHBOR_UPDATE_OPTIONS,
        Self::REQUEST_NODE_INFO,
        Self::GET_ROUTING_INFO,
        Self::GET_ASSOCIATION,
    ];
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

impl From<u8> for FunctionId {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

/// Framing constants threaded into the codec and frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConstants {
    /// Start-of-frame marker.
    pub start_byte: u8,
    /// Minimum envelope size in bytes.
    pub min_frame_size: usize,
    /// Maximum envelope size in bytes.
    pub max_frame_size: usize,
}

impl ProtocolConstants {
    /// Check that the constants describe envelopes the wire format can carry.
    ///
    /// The length byte limits a frame to [`MAX_FRAME_SIZE`], and no frame is
    /// shorter than its fixed header and checksum.
    pub fn validate(&self) -> Result<(), ConstantsError> {
        if self.min_frame_size < MIN_FRAME_SIZE {
            return Err(ConstantsError::MinTooSmall(self.min_frame_size));
        }

        if self.max_frame_size > MAX_FRAME_SIZE {
            return Err(ConstantsError::MaxTooLarge(self.max_frame_size));
        }

        if self.min_frame_size > self.max_frame_size {
            return Err(ConstantsError::Inverted {
                min: self.min_frame_size,
                max: self.max_frame_size,
            });
        }

        if ControlByte::from_byte(self.start_byte).is_some() {
            return Err(ConstantsError::StartIsControl(self.start_byte));
        }

        Ok(())
    }

    /// Largest payload an envelope can carry.
    #[inline]
    pub fn max_payload_size(&self) -> usize {
        self.max_frame_size.saturating_sub(MIN_FRAME_SIZE)
    }
}

impl Default for ProtocolConstants {
    fn default() -> Self {
        Self {
            start_byte: SOF,
            min_frame_size: MIN_FRAME_SIZE,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}
