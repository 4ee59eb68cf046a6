//! Frame buffer for accumulating partial serial reads.
//!
//! Uses `bytes::BytesMut` so complete frames are split off without copying.
//! Implements a small state machine:
//! - `WaitingForStart`: scanning for SOF or a control byte, dropping noise
//! - `WaitingForFrame`: SOF and length seen, need the rest of the frame
//!
//! Complete candidate frames are returned raw; validation is the codec's job.
//!
//! # Example
//!
//! ```
//! use zwave_serial::protocol::{FrameBuffer, Inbound, ControlByte};
//!
//! let mut buffer = FrameBuffer::new();
//!
//! // ACK followed by the first half of a frame
//! let items = buffer.push(&[0x06, 0x01, 0x03]);
//! assert_eq!(items.len(), 1);
//! assert!(matches!(items[0], Inbound::Control(ControlByte::Ack)));
//!
//! let items = buffer.push(&[0x01, 0x15, 0xE8]);
//! assert!(matches!(&items[0], Inbound::Frame(raw) if raw.len() == 5));
//! ```

use bytes::{Buf, Bytes, BytesMut};

use super::constants::{ControlByte, ProtocolConstants};

/// One unit pulled off the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A single link control byte.
    Control(ControlByte),
    /// A complete, not yet validated, envelope frame.
    Frame(Bytes),
}

/// State machine for frame extraction.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Scanning for the next SOF or control byte.
    WaitingForStart,
    /// SOF and length seen, `frame_size` bytes needed in total.
    WaitingForFrame { frame_size: usize },
}

/// Buffer for accumulating incoming bytes and extracting frames.
pub struct FrameBuffer {
    /// Accumulated bytes from transport reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Framing constants.
    constants: ProtocolConstants,
    /// Bytes dropped as line noise since creation.
    discarded: usize,
}

impl FrameBuffer {
    /// Create a frame buffer with the standard constants.
    pub fn new() -> Self {
        Self::with_constants(ProtocolConstants::default())
    }

    /// Create a frame buffer with custom constants.
    pub fn with_constants(constants: ProtocolConstants) -> Self {
        Self {
            buffer: BytesMut::with_capacity(constants.max_frame_size * 2),
            state: State::WaitingForStart,
            constants,
            discarded: 0,
        }
    }

    /// Push data into the buffer and extract everything complete.
    ///
    /// Partial frames stay buffered for the next push.
    pub fn push(&mut self, data: &[u8]) -> Vec<Inbound> {
        self.buffer.extend_from_slice(data);

        let mut items = Vec::new();
        while let Some(item) = self.try_extract_one() {
            items.push(item);
        }
        items
    }

    /// Try to extract a single item, skipping noise on the way.
    fn try_extract_one(&mut self) -> Option<Inbound> {
        loop {
            match self.state {
                State::WaitingForStart => {
                    let first = *self.buffer.first()?;

                    if first == self.constants.start_byte {
                        let length = *self.buffer.get(1)?;
                        let frame_size = length as usize + 2;

                        if frame_size < self.constants.min_frame_size
                            || frame_size > self.constants.max_frame_size
                        {
                            tracing::warn!("Dropping SOF with impossible length byte {}", length);
                            self.discard(1);
                            continue;
                        }

                        self.state = State::WaitingForFrame { frame_size };
                        continue;
                    }

                    if let Some(control) = ControlByte::from_byte(first) {
                        self.buffer.advance(1);
                        return Some(Inbound::Control(control));
                    }

                    self.discard(1);
                }

                State::WaitingForFrame { frame_size } => {
                    if self.buffer.len() < frame_size {
                        return None;
                    }

                    let raw = self.buffer.split_to(frame_size).freeze();
                    self.state = State::WaitingForStart;
                    return Some(Inbound::Frame(raw));
                }
            }
        }
    }

    fn discard(&mut self, count: usize) {
        tracing::trace!("Discarding {} byte(s) of line noise", count);
        self.buffer.advance(count);
        self.discarded += count;
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Bytes dropped as noise so far.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForStart;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::WaitingForStart => "WaitingForStart",
            State::WaitingForFrame { .. } => "WaitingForFrame",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // GET_VERSION request: SOF, len 3, REQUEST, 0x15, checksum
    const GET_VERSION_REQUEST: [u8; 5] = [0x01, 0x03, 0x00, 0x15, 0xE9];

    fn frame(items: &[Inbound], index: usize) -> &[u8] {
        match &items[index] {
            Inbound::Frame(raw) => raw,
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let items = buffer.push(&GET_VERSION_REQUEST);

        assert_eq!(items.len(), 1);
        assert_eq!(frame(&items, 0), &GET_VERSION_REQUEST);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_control_bytes_between_frames() {
        let mut buffer = FrameBuffer::new();
        let mut data = vec![0x06];
        data.extend_from_slice(&GET_VERSION_REQUEST);
        data.push(0x15);
        data.push(0x18);

        let items = buffer.push(&data);

        assert_eq!(items.len(), 4);
        assert_eq!(items[0], Inbound::Control(ControlByte::Ack));
        assert_eq!(frame(&items, 1), &GET_VERSION_REQUEST);
        assert_eq!(items[2], Inbound::Control(ControlByte::Nack));
        assert_eq!(items[3], Inbound::Control(ControlByte::Can));
    }

    #[test]
    fn test_control_value_inside_frame_is_not_control() {
        // 0x15 appears as function id; must stay part of the frame
        let mut buffer = FrameBuffer::new();
        let items = buffer.push(&GET_VERSION_REQUEST);
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Inbound::Frame(_)));
    }

    #[test]
    fn test_noise_is_discarded() {
        let mut buffer = FrameBuffer::new();
        let mut data = vec![0xAA, 0x00, 0x42];
        data.extend_from_slice(&GET_VERSION_REQUEST);

        let items = buffer.push(&data);

        assert_eq!(items.len(), 1);
        assert_eq!(frame(&items, 0), &GET_VERSION_REQUEST);
        assert_eq!(buffer.discarded(), 3);
    }

    #[test]
    fn test_impossible_length_resyncs() {
        let mut buffer = FrameBuffer::new();
        // SOF with length 1 cannot be a frame
        let mut data = vec![0x01, 0x01];
        data.extend_from_slice(&GET_VERSION_REQUEST);

        let items = buffer.push(&data);

        // 0x01 0x01: first SOF dropped, second SOF has length 0x01 -> dropped too
        assert_eq!(items.len(), 1);
        assert_eq!(frame(&items, 0), &GET_VERSION_REQUEST);
    }

    #[test]
    fn test_oversized_length_resyncs() {
        let mut buffer = FrameBuffer::new();
        let mut data = vec![0x01, 0xFF];
        data.extend_from_slice(&GET_VERSION_REQUEST);

        let items = buffer.push(&data);

        assert_eq!(items.len(), 1);
        assert_eq!(frame(&items, 0), &GET_VERSION_REQUEST);
    }

    #[test]
    fn test_fragmented_frame() {
        let mut buffer = FrameBuffer::new();

        let items = buffer.push(&GET_VERSION_REQUEST[..1]);
        assert!(items.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForStart");

        let items = buffer.push(&GET_VERSION_REQUEST[1..3]);
        assert!(items.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForFrame");

        let items = buffer.push(&GET_VERSION_REQUEST[3..]);
        assert_eq!(items.len(), 1);
        assert_eq!(frame(&items, 0), &GET_VERSION_REQUEST);
        assert_eq!(buffer.state_name(), "WaitingForStart");
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let mut all = Vec::new();

        for byte in GET_VERSION_REQUEST.iter().chain([0x06u8].iter()) {
            all.extend(buffer.push(&[*byte]));
        }

        assert_eq!(all.len(), 2);
        assert_eq!(frame(&all, 0), &GET_VERSION_REQUEST);
        assert_eq!(all[1], Inbound::Control(ControlByte::Ack));
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        buffer.push(&GET_VERSION_REQUEST[..3]);
        assert_eq!(buffer.state_name(), "WaitingForFrame");

        buffer.clear();

        assert_eq!(buffer.state_name(), "WaitingForStart");
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_bad_checksum_frame_still_extracted() {
        // The buffer only frames; the codec rejects the checksum later
        let mut buffer = FrameBuffer::new();
        let items = buffer.push(&[0x01, 0x03, 0x00, 0x15, 0x00]);
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Inbound::Frame(_)));
    }
}
