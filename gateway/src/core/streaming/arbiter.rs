//! Exactly-once termination of a streaming response.
//!
//! Two actors race to end a response: the pull loop when the sink runs dry and
//! the completion watcher when the engine reports a failure. The arbiter owns
//! the response writer behind a single mutex so that the state check, the
//! transition and any response write happen in one critical section. Whoever
//! observes `Open` first performs the transition; everyone after that is a
//! no-op with respect to the response.

use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode};
use parking_lot::Mutex;
use serde_json::json;
use tracing::debug;

use super::response::ResponseWriter;
use crate::core::engine::EngineError;

/// Fixed message sent when synthesis fails before any audio was streamed.
pub const SYNTHESIS_FAILED_MESSAGE: &str = "Speech synthesis failed";

/// Status sent when synthesis fails before any audio was streamed.
pub const SYNTHESIS_FAILED_STATUS: StatusCode = StatusCode::INTERNAL_SERVER_ERROR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    Open,
    Ended,
}

/// How the response was finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Sink exhausted, body closed normally
    Completed,
    /// Failure before the first byte; error status and JSON body sent
    FailedBeforeStream,
    /// Failure after streaming began; connection closed without error body
    FailedMidStream,
    /// Client went away
    ClientGone,
}

/// Result of a guarded body write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Response already ended; nothing was written
    Ended,
    /// Client went away during this write; the response is now ended
    ClientGone,
}

struct Gate<W> {
    state: ResponseState,
    termination: Option<Termination>,
    bytes_written: usize,
    writer: W,
}

/// Guards the `Open -> Ended` transition of one response.
pub struct TerminationArbiter<W> {
    gate: Mutex<Gate<W>>,
}

impl<W: ResponseWriter> TerminationArbiter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            gate: Mutex::new(Gate {
                state: ResponseState::Open,
                termination: None,
                bytes_written: 0,
                writer,
            }),
        }
    }

    /// Set a header before anything is committed. Ignored once ended.
    pub fn set_header(&self, name: HeaderName, value: HeaderValue) {
        let mut gate = self.gate.lock();
        if gate.state == ResponseState::Open && !gate.writer.headers_sent() {
            gate.writer.set_header(name, value);
        }
    }

    /// Write a chunk if the response is still open.
    pub fn write(&self, chunk: Bytes) -> WriteOutcome {
        let mut gate = self.gate.lock();
        if gate.state == ResponseState::Ended {
            return WriteOutcome::Ended;
        }

        let len = chunk.len();
        match gate.writer.write(chunk) {
            Ok(()) => {
                gate.bytes_written += len;
                WriteOutcome::Written
            }
            Err(_) => {
                gate.state = ResponseState::Ended;
                gate.termination = Some(Termination::ClientGone);
                WriteOutcome::ClientGone
            }
        }
    }

    /// Close the body normally. Returns true if this call ended the response.
    pub fn finish(&self) -> bool {
        let mut gate = self.gate.lock();
        if gate.state == ResponseState::Ended {
            return false;
        }

        gate.state = ResponseState::Ended;
        gate.termination = Some(Termination::Completed);
        gate.writer.end();
        debug!(bytes = gate.bytes_written, "Response finished");
        true
    }

    /// End the response because synthesis failed. Returns true if this call
    /// ended the response.
    ///
    /// Before any byte was written this sends an error status with a JSON
    /// body; afterwards the status can no longer change, so the connection is
    /// dropped instead.
    pub fn fail(&self, error: &EngineError) -> bool {
        let mut gate = self.gate.lock();
        if gate.state == ResponseState::Ended {
            return false;
        }

        gate.state = ResponseState::Ended;
        if gate.writer.headers_sent() {
            gate.termination = Some(Termination::FailedMidStream);
            gate.writer.abort(&error.to_string());
        } else {
            gate.termination = Some(Termination::FailedBeforeStream);
            gate.writer.send_error(
                SYNTHESIS_FAILED_STATUS,
                json!({ "error": SYNTHESIS_FAILED_MESSAGE }),
            );
        }
        true
    }

    pub fn state(&self) -> ResponseState {
        self.gate.lock().state
    }

    pub fn is_ended(&self) -> bool {
        self.state() == ResponseState::Ended
    }

    pub fn termination(&self) -> Option<Termination> {
        self.gate.lock().termination
    }

    pub fn bytes_written(&self) -> usize {
        self.gate.lock().bytes_written
    }
}
