//! Request and response messages.

use crate::error::ProtocolError;
use crate::frame::{
    element_offset, request_frame_size, COMMAND_OFFSET, LENGTH_OFFSET, RESPONSE_SIZE,
};
use crate::slot::{decode_slot, encode_slot, write_slot, SLOT_SIZE};
use bytes::{BufMut, BytesMut};

/// A decoded request.
///
/// The command is kept as its raw wire code: unknown codes are a semantic
/// error reported by the aggregate engine, not a decode failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Raw command code.
    pub command: i64,
    /// Vector elements; the declared length is `vector.len()`.
    pub vector: Vec<i64>,
}

impl Request {
    pub fn new(command: i64, vector: Vec<i64>) -> Self {
        Self { command, vector }
    }

    /// Returns the declared vector length.
    pub fn vector_len(&self) -> usize {
        self.vector.len()
    }

    /// Encodes a request frame.
    pub fn encode(command: i64, vector: &[i64]) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(request_frame_size(vector.len()));

        buf.put_slice(&encode_slot(command)?);
        buf.put_slice(&encode_slot(vector.len() as i64)?);
        for &value in vector {
            buf.put_slice(&encode_slot(value)?);
        }

        Ok(buf)
    }

    /// Decodes a request frame.
    ///
    /// Reads the command slot, the length slot, then exactly `length`
    /// element slots. Bytes past the last declared element are ignored.
    pub fn decode(raw: &[u8]) -> Result<Self, ProtocolError> {
        let command = decode_slot(raw, COMMAND_OFFSET)?;
        let declared = decode_slot(raw, LENGTH_OFFSET)?;
        let len = usize::try_from(declared).map_err(|_| ProtocolError::InvalidLength(declared))?;

        // Never reserve more than the buffer could possibly hold.
        let available = raw.len().saturating_sub(element_offset(0)) / SLOT_SIZE;
        let mut vector = Vec::with_capacity(len.min(available));
        for i in 0..len {
            vector.push(decode_slot(raw, element_offset(i))?);
        }

        Ok(Self { command, vector })
    }
}

/// Response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    Error,
}

impl ResponseStatus {
    /// Status code written on the wire.
    pub fn code(&self) -> i64 {
        match self {
            ResponseStatus::Ok => 0,
            ResponseStatus::Error => 1,
        }
    }

    /// Interprets a wire status code. Any nonzero code is an error.
    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            ResponseStatus::Ok
        } else {
            ResponseStatus::Error
        }
    }
}

/// A response frame.
///
/// Fields are private so that every `Response` holds slot-representable
/// values and encoding cannot fail. The status code is kept as received so
/// that codes other than 0 and 1 survive decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    status_code: i64,
    result: i64,
}

impl Response {
    /// Creates a success response.
    pub fn ok(result: i64) -> Result<Self, ProtocolError> {
        encode_slot(result)?;
        Ok(Self {
            status_code: ResponseStatus::Ok.code(),
            result,
        })
    }

    /// Creates an error response (result is zero).
    pub fn error() -> Self {
        Self {
            status_code: ResponseStatus::Error.code(),
            result: 0,
        }
    }

    pub fn status(&self) -> ResponseStatus {
        ResponseStatus::from_code(self.status_code)
    }

    /// Returns the status code exactly as it appeared on the wire.
    pub fn status_code(&self) -> i64 {
        self.status_code
    }

    /// Returns the result. Meaningless when the status is an error.
    pub fn result(&self) -> i64 {
        self.result
    }

    pub fn is_ok(&self) -> bool {
        self.status() == ResponseStatus::Ok
    }

    pub fn is_error(&self) -> bool {
        self.status() == ResponseStatus::Error
    }

    /// Encodes the response into its fixed 16-byte frame.
    pub fn encode(&self) -> [u8; RESPONSE_SIZE] {
        let mut buf = [0u8; RESPONSE_SIZE];
        buf[..SLOT_SIZE].copy_from_slice(&write_slot(self.status_code));
        buf[SLOT_SIZE..].copy_from_slice(&write_slot(self.result));
        buf
    }

    /// Decodes a response frame. `raw` must hold at least 16 bytes.
    pub fn decode(raw: &[u8]) -> Result<Self, ProtocolError> {
        let status_code = decode_slot(raw, 0)?;
        let result = decode_slot(raw, SLOT_SIZE)?;
        Ok(Self {
            status_code,
            result,
        })
    }
}
