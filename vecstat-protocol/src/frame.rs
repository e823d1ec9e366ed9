//! Frame layouts.
//!
//! Request frame (16 bytes header + N element slots):
//!
//! ```text
//! +-----------+-------------+-----------+-----+---------------+
//! |  command  | vector len  | element 0 | ... | element N - 1 |
//! |  8 bytes  |   8 bytes   |  8 bytes  |     |    8 bytes    |
//! +-----------+-------------+-----------+-----+---------------+
//! ```
//!
//! Response frame (always 16 bytes):
//!
//! ```text
//! +-----------+-----------+
//! |  status   |  result   |
//! |  8 bytes  |  8 bytes  |
//! +-----------+-----------+
//! ```
//!
//! Every field is a signed varint in a fixed slot (see [`crate::slot`]), so
//! the offset of element `i` is `16 + 8 * i`.

use crate::error::ProtocolError;
use crate::slot::{decode_slot, SLOT_SIZE};

/// Size of the request header (command + vector length slots).
pub const REQUEST_HEADER_SIZE: usize = 2 * SLOT_SIZE;

/// Size of a response frame (status + result slots).
pub const RESPONSE_SIZE: usize = 2 * SLOT_SIZE;

/// Offset of the command slot in a request.
pub const COMMAND_OFFSET: usize = 0;

/// Offset of the vector length slot in a request.
pub const LENGTH_OFFSET: usize = SLOT_SIZE;

/// Returns the byte offset of element `index` in a request frame.
#[inline]
pub fn element_offset(index: usize) -> usize {
    REQUEST_HEADER_SIZE + index * SLOT_SIZE
}

/// Returns the total size of a request frame carrying `len` elements.
#[inline]
pub fn request_frame_size(len: usize) -> usize {
    element_offset(len)
}

/// Framing information taken from a request header.
///
/// Only the length slot is interpreted here; the command slot is left for
/// [`crate::Request::decode`] so that a bad command still lets the reader
/// consume the whole frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Declared number of element slots.
    pub vector_len: usize,
}

impl RequestHeader {
    /// Parses the length slot of a request header.
    ///
    /// Fails when the slot is unparsable, negative, or larger than
    /// `max_vector_len`. In the last case the declared length is still
    /// reported through [`ProtocolError::FrameTooLarge`] so the caller can
    /// skip the body.
    pub fn parse(header: &[u8], max_vector_len: usize) -> Result<Self, ProtocolError> {
        let declared = decode_slot(header, LENGTH_OFFSET)?;
        let vector_len =
            usize::try_from(declared).map_err(|_| ProtocolError::InvalidLength(declared))?;

        if vector_len > max_vector_len {
            return Err(ProtocolError::FrameTooLarge {
                len: vector_len,
                max: max_vector_len,
            });
        }

        Ok(Self { vector_len })
    }

    /// Number of body bytes following the header.
    pub fn body_len(&self) -> usize {
        self.vector_len * SLOT_SIZE
    }

    /// Total frame size including the header.
    pub fn frame_len(&self) -> usize {
        request_frame_size(self.vector_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::encode_slot;

    fn header(command: i64, len: i64) -> [u8; REQUEST_HEADER_SIZE] {
        let mut buf = [0u8; REQUEST_HEADER_SIZE];
        buf[..SLOT_SIZE].copy_from_slice(&encode_slot(command).unwrap());
        buf[SLOT_SIZE..].copy_from_slice(&encode_slot(len).unwrap());
        buf
    }

    #[test]
    fn test_offsets() {
        assert_eq!(element_offset(0), 16);
        assert_eq!(element_offset(3), 40);
        assert_eq!(request_frame_size(0), 16);
        assert_eq!(request_frame_size(5), 56);
    }

    #[test]
    fn test_parse_header() {
        let parsed = RequestHeader::parse(&header(1, 3), 1024).unwrap();
        assert_eq!(parsed.vector_len, 3);
        assert_eq!(parsed.body_len(), 24);
        assert_eq!(parsed.frame_len(), 40);
    }

    #[test]
    fn test_parse_header_ignores_command() {
        // Command slot is garbage, length slot is fine.
        let mut buf = header(0, 2);
        buf[..SLOT_SIZE].copy_from_slice(&[0xff; SLOT_SIZE]);
        assert_eq!(RequestHeader::parse(&buf, 1024).unwrap().vector_len, 2);
    }

    #[test]
    fn test_negative_length() {
        let result = RequestHeader::parse(&header(1, -3), 1024);
        assert_eq!(result, Err(ProtocolError::InvalidLength(-3)));
    }

    #[test]
    fn test_length_too_large() {
        let result = RequestHeader::parse(&header(1, 2048), 1024);
        assert_eq!(
            result,
            Err(ProtocolError::FrameTooLarge {
                len: 2048,
                max: 1024
            })
        );
    }

    #[test]
    fn test_invalid_length_slot() {
        let mut buf = header(1, 0);
        buf[SLOT_SIZE..].copy_from_slice(&[0x80; SLOT_SIZE]);
        assert_eq!(
            RequestHeader::parse(&buf, 1024),
            Err(ProtocolError::InvalidVarint {
                offset: LENGTH_OFFSET
            })
        );
    }
}
