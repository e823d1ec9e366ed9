//! Encoder and decoder entry points.
//!
//! Thin stateless facades over [`Request`] and [`Response`] used by the
//! server and the client.

use crate::error::ProtocolError;
use crate::frame::RESPONSE_SIZE;
use crate::message::{Request, Response, ResponseStatus};
use bytes::BytesMut;

/// Encodes requests and responses into frames.
pub struct Encoder;

impl Encoder {
    /// Encodes a request frame for `command` over `vector`.
    pub fn encode_request(command: i64, vector: &[i64]) -> Result<BytesMut, ProtocolError> {
        Request::encode(command, vector)
    }

    /// Encodes a response frame.
    pub fn encode_response(response: &Response) -> [u8; RESPONSE_SIZE] {
        response.encode()
    }

    /// Encodes the generic error response (status 1, result 0).
    pub fn encode_error_response() -> [u8; RESPONSE_SIZE] {
        Response::error().encode()
    }
}

/// Decodes frames into requests and responses.
pub struct Decoder;

impl Decoder {
    /// Decodes a complete request frame.
    pub fn decode_request(raw: &[u8]) -> Result<Request, ProtocolError> {
        Request::decode(raw)
    }

    /// Decodes a response frame into its status and result.
    pub fn decode_response(raw: &[u8]) -> Result<(ResponseStatus, i64), ProtocolError> {
        let response = Response::decode(raw)?;
        Ok((response.status(), response.result()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_decoder_roundtrip() {
        let encoded = Encoder::encode_request(1, &[3, 7, 2]).unwrap();
        let request = Decoder::decode_request(&encoded).unwrap();
        assert_eq!(request.command, 1);
        assert_eq!(request.vector_len(), 3);
        assert_eq!(request.vector, vec![3, 7, 2]);
    }

    #[test]
    fn test_encode_response() {
        let encoded = Encoder::encode_response(&Response::ok(-42).unwrap());
        assert_eq!(encoded.len(), RESPONSE_SIZE);
        assert_eq!(
            Decoder::decode_response(&encoded).unwrap(),
            (ResponseStatus::Ok, -42)
        );
    }

    #[test]
    fn test_encode_error_response() {
        let encoded = Encoder::encode_error_response();
        assert_eq!(
            Decoder::decode_response(&encoded).unwrap(),
            (ResponseStatus::Error, 0)
        );
    }
}
