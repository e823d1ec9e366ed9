//! Signed varints stored in fixed 8-byte slots.
//!
//! Each field is zigzag encoded, written as little-endian base-128 groups
//! (7 payload bits per byte, high bit set on every byte but the last) and
//! padded with zeros to the slot size:
//!
//! ```text
//! value  7      -> 0e 00 00 00 00 00 00 00
//! value -1      -> 01 00 00 00 00 00 00 00
//! value  300    -> d8 04 00 00 00 00 00 00
//! ```
//!
//! A slot carries at most 56 payload bits, which bounds the representable
//! range to [`SLOT_MIN`, `SLOT_MAX`].

use crate::error::ProtocolError;

/// Size of a single field slot in bytes.
pub const SLOT_SIZE: usize = 8;

/// Largest value that fits a slot (2^55 - 1).
pub const SLOT_MAX: i64 = (1 << 55) - 1;

/// Smallest value that fits a slot (-2^55).
pub const SLOT_MIN: i64 = -(1 << 55);

/// Encodes a signed value into a zero-padded slot.
pub fn encode_slot(value: i64) -> Result<[u8; SLOT_SIZE], ProtocolError> {
    if !(SLOT_MIN..=SLOT_MAX).contains(&value) {
        return Err(ProtocolError::ValueOutOfRange(value));
    }
    Ok(write_slot(value))
}

/// Encodes a value already known to be within [`SLOT_MIN`, `SLOT_MAX`].
pub(crate) fn write_slot(value: i64) -> [u8; SLOT_SIZE] {
    debug_assert!((SLOT_MIN..=SLOT_MAX).contains(&value));

    let mut zigzag = ((value << 1) ^ (value >> 63)) as u64;
    let mut slot = [0u8; SLOT_SIZE];
    let mut i = 0;
    while zigzag >= 0x80 {
        slot[i] = (zigzag as u8) | 0x80;
        zigzag >>= 7;
        i += 1;
    }
    slot[i] = zigzag as u8;
    slot
}

/// Decodes the slot starting at `offset` in `buf`.
///
/// Fails when fewer than [`SLOT_SIZE`] bytes remain or when no terminating
/// byte occurs inside the slot. Bytes after the terminator are ignored.
pub fn decode_slot(buf: &[u8], offset: usize) -> Result<i64, ProtocolError> {
    let slot = buf
        .get(offset..offset + SLOT_SIZE)
        .ok_or(ProtocolError::SlotTruncated {
            offset,
            available: buf.len().saturating_sub(offset),
        })?;

    let mut zigzag: u64 = 0;
    for (i, &byte) in slot.iter().enumerate() {
        zigzag |= u64::from(byte & 0x7f) << (7 * i);
        if byte < 0x80 {
            return Ok(((zigzag >> 1) as i64) ^ -((zigzag & 1) as i64));
        }
    }

    Err(ProtocolError::InvalidVarint { offset })
}
