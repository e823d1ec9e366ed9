//! Per-connection request loop.
//!
//! A handler owns one byte stream and serves requests strictly in order:
//! response N is written before request N+1 is read. Frames are read
//! exactly (header, then `8 * len` body bytes) so a request split across
//! several TCP segments is reassembled, and a slow sender is simply waited
//! for until the idle timeout.

use crate::error::ServerError;
use crate::metrics::Metrics;
use crate::session::{Session, SessionState};
use bytes::BytesMut;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use vecstat_core::{compute, Aggregate};
use vecstat_protocol::{ProtocolError, Request, RequestHeader, Response, REQUEST_HEADER_SIZE};

/// Scratch size used when skipping the body of an oversized frame.
const DISCARD_CHUNK: usize = 8192;

/// Largest amount the frame buffer grows by per read. Memory held for a
/// frame tracks the bytes actually received, not the declared length.
const READ_CHUNK: usize = 64 * 1024;

/// Limits applied by a connection handler.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Largest accepted declared vector length.
    pub max_vector_len: usize,
    /// Maximum time a single read may wait for data.
    pub idle_timeout: Duration,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            max_vector_len: vecstat_protocol::MAX_VECTOR_LEN,
            idle_timeout: Duration::from_secs(300),
        }
    }
}

/// Result of reading one frame off the stream.
#[derive(Debug)]
enum ReadOutcome {
    /// A complete frame, header included.
    Frame(BytesMut),
    /// The header was rejected; its body (if any) has been skipped.
    Rejected(ProtocolError),
    /// The peer closed its write side partway through a frame.
    Truncated { received: usize },
    /// The peer closed cleanly between frames.
    Closed,
}

/// Serves requests on a single connection.
pub struct ConnectionHandler<S> {
    stream: S,
    session: Session,
    config: HandlerConfig,
    metrics: Option<Arc<Metrics>>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, session: Session, config: HandlerConfig) -> Self {
        Self {
            stream,
            session,
            config,
            metrics: None,
        }
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Option<Arc<Metrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs the request loop until the peer disconnects, an I/O error
    /// occurs, the idle timeout elapses or `shutdown` fires.
    ///
    /// A clean disconnect (including a truncated final frame, which is
    /// answered with an error response first) returns `Ok(())`.
    pub async fn run(&mut self, shutdown: &mut broadcast::Receiver<()>) -> Result<(), ServerError> {
        let addr = self.session.remote_addr;
        let result = self.serve(shutdown).await;
        self.session.set_state(SessionState::Closed);

        tracing::debug!(
            "[{}] Session closed after {} request(s), {} error(s), {:?}",
            addr,
            self.session.request_count(),
            self.session.error_count(),
            self.session.age()
        );
        result
    }

    async fn serve(&mut self, shutdown: &mut broadcast::Receiver<()>) -> Result<(), ServerError> {
        let addr = self.session.remote_addr;

        loop {
            self.session.set_state(SessionState::Reading);

            let outcome = tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", addr);
                    return Err(ServerError::ShuttingDown);
                }
                outcome = self.read_frame() => outcome?,
            };

            let response = match outcome {
                ReadOutcome::Frame(frame) => self.process(&frame),
                ReadOutcome::Rejected(e) => {
                    tracing::debug!("[{}] Rejected frame header: {}", addr, e);
                    self.record_error(e.kind());
                    Response::error()
                }
                ReadOutcome::Truncated { received } => {
                    tracing::debug!(
                        "[{}] Peer closed mid-frame after {} byte(s)",
                        addr,
                        received
                    );
                    self.record_error("truncated_frame");
                    self.session.record_request(true);
                    self.session.set_state(SessionState::Responding);
                    // Best effort: the peer may already be gone entirely.
                    if let Err(e) = self.stream.write_all(&Response::error().encode()).await {
                        tracing::debug!("[{}] Could not answer truncated frame: {}", addr, e);
                    }
                    return Ok(());
                }
                ReadOutcome::Closed => {
                    tracing::debug!("[{}] Connection closed by client", addr);
                    return Ok(());
                }
            };

            self.session.record_request(response.is_error());
            self.session.set_state(SessionState::Responding);
            tracing::debug!(
                "[{}] Response: {} result={}",
                addr,
                if response.is_ok() { "OK" } else { "ERROR" },
                response.result()
            );
            self.stream.write_all(&response.encode()).await?;
        }
    }

    /// Decodes a complete frame and runs the requested aggregate.
    fn process(&mut self, frame: &[u8]) -> Response {
        let addr = self.session.remote_addr;
        self.session.set_state(SessionState::Decoding);

        let request = match Request::decode(frame) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!("[{}] Decode error: {}", addr, e);
                self.record_error(e.kind());
                return Response::error();
            }
        };

        let label = Aggregate::try_from(request.command)
            .map(|a| a.name())
            .unwrap_or("invalid");
        tracing::debug!(
            "[{}] Request: {} over {} value(s)",
            addr,
            label,
            request.vector_len()
        );

        self.session.set_state(SessionState::Computing);
        let start = Instant::now();
        let computed = compute(request.command, &request.vector);
        if let Some(ref metrics) = self.metrics {
            metrics.requests_total.with_label_values(&[label]).inc();
            metrics
                .request_duration
                .with_label_values(&[label])
                .observe(start.elapsed().as_secs_f64());
        }

        match computed {
            Ok(value) => match Response::ok(value) {
                Ok(response) => response,
                Err(e) => {
                    self.record_error(e.kind());
                    Response::error()
                }
            },
            Err(e) => {
                tracing::debug!("[{}] Compute error: {}", addr, e);
                self.record_error(e.kind());
                Response::error()
            }
        }
    }

    /// Reads one frame, leaving the stream positioned at the next one.
    async fn read_frame(&mut self) -> Result<ReadOutcome, ServerError> {
        let mut header = [0u8; REQUEST_HEADER_SIZE];
        let n = self.read_full(&mut header).await?;
        if n == 0 {
            return Ok(ReadOutcome::Closed);
        }
        if n < REQUEST_HEADER_SIZE {
            return Ok(ReadOutcome::Truncated { received: n });
        }

        let parsed = match RequestHeader::parse(&header, self.config.max_vector_len) {
            Ok(parsed) => parsed,
            Err(ProtocolError::FrameTooLarge { len, max }) => {
                tracing::warn!(
                    "[{}] Frame of {} elements exceeds limit {}, discarding body",
                    self.session.remote_addr,
                    len,
                    max
                );
                let body = len.saturating_mul(vecstat_protocol::SLOT_SIZE);
                let skipped = self.discard(body).await?;
                if skipped < body {
                    return Ok(ReadOutcome::Truncated {
                        received: REQUEST_HEADER_SIZE + skipped,
                    });
                }
                return Ok(ReadOutcome::Rejected(ProtocolError::FrameTooLarge { len, max }));
            }
            Err(e) => return Ok(ReadOutcome::Rejected(e)),
        };

        let frame_len = parsed.frame_len();
        let mut frame = BytesMut::with_capacity(frame_len.min(REQUEST_HEADER_SIZE + READ_CHUNK));
        frame.extend_from_slice(&header);
        while frame.len() < frame_len {
            let want = (frame_len - frame.len()).min(READ_CHUNK);
            frame.reserve(want);
            if self.read_limited(&mut frame, want).await? == 0 {
                return Ok(ReadOutcome::Truncated {
                    received: frame.len(),
                });
            }
        }

        Ok(ReadOutcome::Frame(frame))
    }

    /// Appends at most `limit` bytes to `buf` with a single read.
    async fn read_limited(
        &mut self,
        buf: &mut BytesMut,
        limit: usize,
    ) -> Result<usize, ServerError> {
        let mut limited = (&mut self.stream).take(limit as u64);
        match tokio::time::timeout(self.config.idle_timeout, limited.read_buf(buf)).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::warn!("[{}] Idle timeout", self.session.remote_addr);
                Err(ServerError::IdleTimeout)
            }
        }
    }

    /// Fills `buf`, looping on partial reads. Returns fewer bytes than
    /// `buf.len()` only when the peer closed.
    async fn read_full(&mut self, buf: &mut [u8]) -> Result<usize, ServerError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_some(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Reads and drops `len` bytes. Returns how many were actually skipped.
    async fn discard(&mut self, len: usize) -> Result<usize, ServerError> {
        let mut scratch = [0u8; DISCARD_CHUNK];
        let mut skipped = 0;
        while skipped < len {
            let want = (len - skipped).min(DISCARD_CHUNK);
            let n = self.read_some(&mut scratch[..want]).await?;
            if n == 0 {
                break;
            }
            skipped += n;
        }
        Ok(skipped)
    }

    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, ServerError> {
        match tokio::time::timeout(self.config.idle_timeout, self.stream.read(buf)).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::warn!("[{}] Idle timeout", self.session.remote_addr);
                Err(ServerError::IdleTimeout)
            }
        }
    }

    fn record_error(&self, kind: &str) {
        if let Some(ref metrics) = self.metrics {
            metrics.record_error(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio_test::io::Builder;
    use vecstat_protocol::{encode_slot, Encoder};

    fn session() -> Session {
        let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        Session::new(1, addr)
    }

    fn config() -> HandlerConfig {
        HandlerConfig {
            max_vector_len: 16,
            idle_timeout: Duration::from_secs(5),
        }
    }

    fn request(command: i64, values: &[i64]) -> Vec<u8> {
        Encoder::encode_request(command, values).unwrap().to_vec()
    }

    fn ok(result: i64) -> [u8; 16] {
        Response::ok(result).unwrap().encode()
    }

    fn err() -> [u8; 16] {
        Encoder::encode_error_response()
    }

    async fn run_handler<S>(stream: S, config: HandlerConfig) -> (Result<(), ServerError>, Session)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (_tx, mut rx) = broadcast::channel(1);
        let mut handler = ConnectionHandler::new(stream, session(), config);
        let result = handler.run(&mut rx).await;
        (result, handler.session)
    }

    #[tokio::test]
    async fn test_single_request() {
        let stream = Builder::new()
            .read(&request(1, &[3, 7, 2]))
            .write(&ok(7))
            .build();

        let (result, session) = run_handler(stream, config()).await;
        assert!(result.is_ok());
        assert_eq!(session.request_count(), 1);
        assert_eq!(session.error_count(), 0);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_sequential_requests() {
        let stream = Builder::new()
            .read(&request(3, &[5, 1, 9, 2]))
            .write(&ok(5))
            .read(&request(2, &[5, 1, 9, 2]))
            .write(&ok(1))
            .read(&request(4, &[2, 8, 8, 2, 3]))
            .write(&ok(2))
            .build();

        let (result, session) = run_handler(stream, config()).await;
        assert!(result.is_ok());
        assert_eq!(session.request_count(), 3);
    }

    #[tokio::test]
    async fn test_invalid_command_keeps_connection() {
        let stream = Builder::new()
            .read(&request(9, &[1, 2, 3]))
            .write(&err())
            .read(&request(1, &[1, 2, 3]))
            .write(&ok(3))
            .build();

        let (result, session) = run_handler(stream, config()).await;
        assert!(result.is_ok());
        assert_eq!(session.request_count(), 2);
        assert_eq!(session.error_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_vector_is_error() {
        let stream = Builder::new()
            .read(&request(1, &[]))
            .write(&err())
            .build();

        let (result, session) = run_handler(stream, config()).await;
        assert!(result.is_ok());
        assert_eq!(session.error_count(), 1);
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let frame = request(1, &[4, 40, 400, 4000, 40000]);
        let stream = Builder::new()
            .read(&frame[..5])
            .read(&frame[5..21])
            .wait(Duration::from_millis(20))
            .read(&frame[21..])
            .write(&ok(40000))
            .build();

        let (result, _) = run_handler(stream, config()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_two_frames_in_one_read() {
        let mut bytes = request(1, &[1, 2]);
        bytes.extend_from_slice(&request(2, &[1, 2]));
        let stream = Builder::new()
            .read(&bytes)
            .write(&ok(2))
            .write(&ok(1))
            .build();

        let (result, _) = run_handler(stream, config()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_truncated_frame_gets_error_then_close() {
        // Declares 5 elements but only 3 arrive before EOF.
        let frame = request(1, &[1, 2, 3, 4, 5]);
        let stream = Builder::new().read(&frame[..40]).write(&err()).build();

        let (result, session) = run_handler(stream, config()).await;
        assert!(result.is_ok());
        assert_eq!(session.error_count(), 1);
    }

    #[tokio::test]
    async fn test_truncated_header_gets_error_then_close() {
        let frame = request(1, &[1]);
        let stream = Builder::new().read(&frame[..10]).write(&err()).build();

        let (result, _) = run_handler(stream, config()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_negative_length_consumes_no_body() {
        let mut bad = Vec::new();
        bad.extend_from_slice(&encode_slot(1).unwrap());
        bad.extend_from_slice(&encode_slot(-3).unwrap());

        let stream = Builder::new()
            .read(&bad)
            .write(&err())
            .read(&request(2, &[8, 6]))
            .write(&ok(6))
            .build();

        let (result, _) = run_handler(stream, config()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_element_slot() {
        let mut frame = request(1, &[1, 2]);
        frame[16..24].copy_from_slice(&[0xff; 8]);

        let stream = Builder::new()
            .read(&frame)
            .write(&err())
            .read(&request(1, &[1, 2]))
            .write(&ok(2))
            .build();

        let (result, _) = run_handler(stream, config()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_oversized_frame_body_is_discarded() {
        let config = HandlerConfig {
            max_vector_len: 2,
            ..config()
        };
        let stream = Builder::new()
            .read(&request(1, &[1, 2, 3, 4]))
            .write(&err())
            .read(&request(1, &[1, 2]))
            .write(&ok(2))
            .build();

        let (result, session) = run_handler(stream, config).await;
        assert!(result.is_ok());
        assert_eq!(session.request_count(), 2);
        assert_eq!(session.error_count(), 1);
    }

    #[tokio::test]
    async fn test_huge_declared_length_is_not_preallocated() {
        // A length near the slot maximum under an unbounded limit must not
        // allocate the whole frame before any body byte arrives.
        let config = HandlerConfig {
            max_vector_len: usize::MAX,
            ..config()
        };
        let mut header = Vec::new();
        header.extend_from_slice(&encode_slot(1).unwrap());
        header.extend_from_slice(&encode_slot(1 << 50).unwrap());
        header.extend_from_slice(&encode_slot(9).unwrap());

        let stream = Builder::new().read(&header).write(&err()).build();

        let (result, session) = run_handler(stream, config).await;
        assert!(result.is_ok());
        assert_eq!(session.error_count(), 1);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_large_frame_across_many_reads() {
        let values: Vec<i64> = (0..20_000).collect();
        let frame = request(1, &values);
        let mut builder = Builder::new();
        for chunk in frame.chunks(5000) {
            builder.read(chunk);
        }
        let stream = builder.write(&ok(19_999)).build();

        let config = HandlerConfig {
            max_vector_len: 32_768,
            ..config()
        };
        let (result, session) = run_handler(stream, config).await;
        assert!(result.is_ok());
        assert_eq!(session.error_count(), 0);
    }

    #[tokio::test]
    async fn test_write_error_closes() {
        let stream = Builder::new()
            .read(&request(1, &[1, 2]))
            .write_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "broken pipe",
            ))
            .build();

        let (result, session) = run_handler(stream, config()).await;
        assert!(matches!(result, Err(ServerError::Io(_))));
        assert_eq!(session.request_count(), 1);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let config = HandlerConfig {
            idle_timeout: Duration::from_millis(20),
            ..config()
        };
        let stream = Builder::new().wait(Duration::from_secs(2)).build();

        let (result, session) = run_handler(stream, config).await;
        assert!(matches!(result, Err(ServerError::IdleTimeout)));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_read_error_closes() {
        let stream = Builder::new()
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();

        let (result, _) = run_handler(stream, config()).await;
        assert!(matches!(result, Err(ServerError::Io(_))));
    }

    #[tokio::test]
    async fn test_shutdown_signal() {
        let (tx, mut rx) = broadcast::channel(1);
        let stream = Builder::new().wait(Duration::from_secs(2)).build();
        let mut handler = ConnectionHandler::new(stream, session(), config());

        tx.send(()).unwrap();
        let result = handler.run(&mut rx).await;
        assert!(matches!(result, Err(ServerError::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_metrics_recorded() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let stream = Builder::new()
            .read(&request(1, &[1]))
            .write(&ok(1))
            .read(&request(7, &[1]))
            .write(&err())
            .build();

        let (_tx, mut rx) = broadcast::channel(1);
        let mut handler =
            ConnectionHandler::new(stream, session(), config()).with_metrics(Some(metrics.clone()));
        handler.run(&mut rx).await.unwrap();

        let encoded = String::from_utf8(metrics.encode()).unwrap();
        assert!(encoded.contains("vecstat_requests_total{command=\"max\"} 1"));
        assert!(encoded.contains("vecstat_requests_total{command=\"invalid\"} 1"));
        assert!(encoded.contains("vecstat_errors_total{kind=\"invalid_command\"} 1"));
    }
}
