//! Error types for zwave-serial.
//!
//! Framing, payload and encode errors are plain values that callers branch
//! on. Transaction and transport failures travel as [`LinkError`] inside
//! outcomes and events.

use thiserror::Error;

use crate::protocol::{FunctionId, MAX_FRAME_SIZE, MIN_FRAME_SIZE};

/// Checksum helper failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChecksumError {
    /// Requested length exceeds the buffer.
    #[error("length {len} exceeds buffer of {available} bytes")]
    Range { len: usize, available: usize },

    /// Frame is below the minimum envelope size.
    #[error("frame of {0} bytes is below the minimum size")]
    TooShort(usize),
}

/// Framing constants that cannot describe a valid envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConstantsError {
    #[error("minimum frame size {0} is below {MIN_FRAME_SIZE}")]
    MinTooSmall(usize),

    #[error("maximum frame size {0} exceeds {MAX_FRAME_SIZE}")]
    MaxTooLarge(usize),

    #[error("minimum frame size {min} exceeds maximum {max}")]
    Inverted { min: usize, max: usize },

    /// The start byte would be read as ACK, NACK or CAN.
    #[error("start byte 0x{0:02X} collides with a control byte")]
    StartIsControl(u8),
}

/// Why a raw buffer could not be decoded into an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("frame too short ({0} bytes)")]
    TooShort(usize),

    #[error("frame too long ({0} bytes)")]
    TooLong(usize),

    #[error("first byte 0x{0:02X} is not SOF")]
    BadStart(u8),

    #[error("length byte {found} does not match frame size (expected {expected})")]
    BadLength { found: u8, expected: usize },

    #[error("checksum mismatch (frame 0x{found:02X}, computed 0x{computed:02X})")]
    BadChecksum { found: u8, computed: u8 },

    #[error("invalid message type 0x{0:02X}")]
    BadType(u8),
}

/// Function-specific payload validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("payload of {len} bytes is smaller than the required {min}")]
    TooSmall { len: usize, min: usize },

    #[error("payload of {len} bytes has unexpected trailing data (max {max})")]
    UnexpectedTrailingData { len: usize, max: usize },

    #[error("controller version must be exactly 12 bytes, got {0}")]
    BadVersionLength(usize),
}

/// Why an envelope could not be serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("cannot encode an invalid message")]
    Invalid,

    #[error("payload does not match declared length {payload_len}")]
    InconsistentPayload { payload_len: usize },

    #[error("frame of {0} bytes exceeds the maximum frame size")]
    TooLarge(usize),

    #[error("frame of {0} bytes is below the minimum frame size")]
    TooSmall(usize),
}

/// Registry outcome when no message could be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BuildError {
    /// No constructor registered for this function id.
    #[error("unsupported function id {0}")]
    Unsupported(FunctionId),

    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),
}

/// Main error type for link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// I/O error from the underlying port or stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON configuration error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Framing constants rejected at configuration time.
    #[error("invalid protocol constants: {0}")]
    Constants(#[from] ConstantsError),

    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),

    /// The link has not been opened.
    #[error("Not ready for operation")]
    NotReady,

    /// A transaction is already outstanding.
    #[error("Transaction pending")]
    TransactionPending,

    /// Control bytes cannot be submitted as transactions.
    #[error("Not a protocol message")]
    NotAProtocolMessage,

    /// The set of required reply ids is empty.
    #[error("Invalid list of required response IDs")]
    InvalidReplySet,

    /// Transport open/close/write failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A timer fired for a transaction that no longer exists.
    #[error("Timeout when no transaction outstanding")]
    StaleTimeout,

    /// The coordinator task or the transport went away.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using LinkError.
pub type Result<T> = std::result::Result<T, LinkError>;
