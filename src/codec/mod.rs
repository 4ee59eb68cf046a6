//! Codec module - envelope serialization and deserialization.
//!
//! - [`FrameCodec`] - byte-exact decode/encode of data frames plus the
//!   single-byte control frames
//!
//! # Design
//!
//! The codec is a small `Copy` value carrying the framing constants, so the
//! coordinator, tests and tools can each hold their own without sharing state.
//! Control bytes are encoded here but never decoded as envelopes; the
//! [`FrameBuffer`](crate::protocol::FrameBuffer) separates them first.

mod frame;

pub use frame::FrameCodec;
