//! Link checksum: XOR of every covered byte, seeded with 0xFF.
//!
//! The checksum covers the length byte through the last payload byte,
//! so it excludes SOF and the checksum slot itself.

use super::constants::{CHECKSUM_SEED, MIN_FRAME_SIZE};
use crate::error::ChecksumError;

/// Compute the checksum over `bytes[0..len)`.
///
/// # Example
///
/// ```
/// use zwave_serial::protocol::checksum;
///
/// assert_eq!(checksum::calc(&[0x12], 1).unwrap(), 0x12 ^ 0xFF);
/// ```
pub fn calc(bytes: &[u8], len: usize) -> Result<u8, ChecksumError> {
    if len > bytes.len() {
        return Err(ChecksumError::Range {
            len,
            available: bytes.len(),
        });
    }

    Ok(bytes[..len].iter().fold(CHECKSUM_SEED, |cs, b| cs ^ b))
}

/// Check the trailing checksum byte of a complete frame.
pub fn is_valid(frame: &[u8], frame_len: usize) -> Result<bool, ChecksumError> {
    if frame_len > frame.len() {
        return Err(ChecksumError::Range {
            len: frame_len,
            available: frame.len(),
        });
    }

    if frame_len < MIN_FRAME_SIZE {
        return Err(ChecksumError::TooShort(frame_len));
    }

    let covered = &frame[1..frame_len - 1];
    let computed = calc(covered, covered.len())?;

    Ok(computed == frame[frame_len - 1])
}
