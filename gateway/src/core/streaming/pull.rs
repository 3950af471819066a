//! Audio pull loop.
//!
//! Drains a synthesis job's sink into the response in fixed-size pulls. The
//! loop is driven only by the sink: a zero-length pull is the end of audio,
//! regardless of whether the engine has reported success yet.

use std::time::Duration;

use tracing::{debug, warn};

use super::arbiter::{TerminationArbiter, WriteOutcome};
use super::response::ResponseWriter;
use crate::core::engine::{AudioSink, EngineError};

/// Why the pull loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullEnd {
    /// The sink returned a zero-length pull
    Exhausted,
    /// The client went away; no further pulls were made
    ClientGone,
    /// Pulling failed (including inactivity timeout)
    SinkFailed(EngineError),
}

/// Totals for one pull loop run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullSummary {
    /// Chunks written to the response
    pub chunks: usize,
    /// Bytes written to the response
    pub bytes: usize,
    /// Bytes pulled after the response had already ended
    pub discarded_bytes: usize,
    pub end: PullEnd,
}

/// Pull `chunk_size` bytes at a time until the sink is exhausted.
///
/// Each pull is bounded by `inactivity_timeout` when set; a timeout is
/// reported to the arbiter like any other sink failure.
pub async fn pull_audio<W: ResponseWriter>(
    sink: &mut dyn AudioSink,
    arbiter: &TerminationArbiter<W>,
    chunk_size: usize,
    inactivity_timeout: Option<Duration>,
) -> PullSummary {
    let mut summary = PullSummary {
        chunks: 0,
        bytes: 0,
        discarded_bytes: 0,
        end: PullEnd::Exhausted,
    };

    loop {
        let pulled = match inactivity_timeout {
            Some(limit) => match tokio::time::timeout(limit, sink.pull(chunk_size)).await {
                Ok(result) => result,
                Err(_) => Err(EngineError::Timeout(limit.as_millis() as u64)),
            },
            None => sink.pull(chunk_size).await,
        };

        let chunk = match pulled {
            Ok(chunk) => chunk,
            Err(e) => {
                if arbiter.fail(&e) {
                    warn!(error = %e, bytes = summary.bytes, "Audio sink failed, response ended");
                } else {
                    debug!(error = %e, "Audio sink failed after response ended");
                }
                summary.end = PullEnd::SinkFailed(e);
                return summary;
            }
        };

        if chunk.is_empty() {
            arbiter.finish();
            summary.end = PullEnd::Exhausted;
            return summary;
        }

        let len = chunk.len();
        match arbiter.write(chunk) {
            WriteOutcome::Written => {
                summary.chunks += 1;
                summary.bytes += len;
            }
            WriteOutcome::Ended => summary.discarded_bytes += len,
            WriteOutcome::ClientGone => {
                debug!(bytes = summary.bytes, "Client disconnected during audio stream");
                summary.end = PullEnd::ClientGone;
                return summary;
            }
        }
    }
}
