//! Protocol module - wire constants, checksum, envelopes and framing.
//!
//! This module implements the serial wire format:
//! - identifier types and framing constants
//! - the XOR link checksum
//! - the [`Envelope`] data frame
//! - [`FrameBuffer`] for splitting a byte stream into frames and control bytes

pub mod checksum;
mod constants;
mod envelope;
mod frame_buffer;

pub use constants::{
    ControlByte, FunctionId, MessageType, ProtocolConstants, CHECKSUM_SEED, INVALID_CALLBACK_ID,
    MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, MIN_FRAME_SIZE, SOF,
};
pub use envelope::Envelope;
pub use frame_buffer::{FrameBuffer, Inbound};
