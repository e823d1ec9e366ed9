//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding or decoding frames.
///
/// None of these cross the wire: the server answers every decode failure
/// with the same generic error status.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid varint in slot at offset {offset}")]
    InvalidVarint { offset: usize },

    #[error("truncated slot at offset {offset}: {available} of 8 bytes available")]
    SlotTruncated { offset: usize, available: usize },

    #[error("value {0} does not fit an 8-byte slot")]
    ValueOutOfRange(i64),

    #[error("invalid vector length: {0}")]
    InvalidLength(i64),

    #[error("frame too large: {len} elements (max {max})")]
    FrameTooLarge { len: usize, max: usize },
}

impl ProtocolError {
    /// Returns a short label suitable for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::InvalidVarint { .. } => "invalid_varint",
            ProtocolError::SlotTruncated { .. } => "slot_truncated",
            ProtocolError::ValueOutOfRange(_) => "value_out_of_range",
            ProtocolError::InvalidLength(_) => "invalid_length",
            ProtocolError::FrameTooLarge { .. } => "frame_too_large",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::InvalidVarint { offset: 16 };
        assert!(err.to_string().contains("16"));

        let err = ProtocolError::SlotTruncated {
            offset: 24,
            available: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("24"));
        assert!(msg.contains("3 of 8"));

        let err = ProtocolError::ValueOutOfRange(i64::MAX);
        assert!(err.to_string().contains(&i64::MAX.to_string()));

        let err = ProtocolError::InvalidLength(-4);
        assert!(err.to_string().contains("-4"));

        let err = ProtocolError::FrameTooLarge { len: 100, max: 50 };
        assert!(err.to_string().contains("100"));
    }

    #[test]
    fn test_protocol_error_kind() {
        assert_eq!(
            ProtocolError::InvalidVarint { offset: 0 }.kind(),
            "invalid_varint"
        );
        assert_eq!(ProtocolError::InvalidLength(-1).kind(), "invalid_length");
        assert_eq!(
            ProtocolError::FrameTooLarge { len: 9, max: 8 }.kind(),
            "frame_too_large"
        );
    }
}
