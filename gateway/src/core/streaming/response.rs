//! Response writer abstraction used by the streaming bridge.
//!
//! A writer models an HTTP response whose status line and headers are committed
//! lazily: headers may be set until the first body write (or an error
//! response) commits them. The HTTP layer provides a channel-backed writer;
//! tests provide recording writers.

use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode};
use thiserror::Error;

/// The client is no longer receiving the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("client disconnected")]
pub struct ClientDisconnected;

/// Sink for one HTTP response.
pub trait ResponseWriter: Send {
    /// Set a header on the not-yet-committed response.
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    /// True once status and headers have been committed.
    fn headers_sent(&self) -> bool;

    /// Append body bytes, committing a `200 OK` head on first use.
    fn write(&mut self, chunk: Bytes) -> Result<(), ClientDisconnected>;

    /// Complete the body normally.
    fn end(&mut self);

    /// Replace the response with an error status and JSON body.
    ///
    /// Only meaningful while `headers_sent()` is false.
    fn send_error(&mut self, status: StatusCode, body: serde_json::Value);

    /// Drop the connection without completing the body.
    fn abort(&mut self, reason: &str);
}
