//! Streaming synthesis bridge.
//!
//! Starts a synthesis job and runs its two activities side by side:
//!
//! - a completion watcher that waits for the engine's terminal event, reports
//!   failures to the arbiter and releases the job
//! - the pull loop, which drains audio into the response and owns normal
//!   completion
//!
//! Response headers are prepared in [`SpeechStreamer::open`], synchronously and
//! before either activity exists, so they always precede the first byte.

use std::sync::Arc;
use std::time::Duration;

use http::HeaderValue;
use http::header::{CONTENT_TYPE, TRANSFER_ENCODING};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::arbiter::{Termination, TerminationArbiter};
use super::pull::{PullEnd, PullSummary, pull_audio};
use super::response::ResponseWriter;
use crate::core::engine::{EngineResult, JobHandle, SynthesisEngine};
use crate::core::ssml::SsmlDocument;

/// Content type announced for streamed audio.
pub const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/wav";

/// Bytes requested from the sink per pull.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Longest wait for the next chunk before the stream is treated as failed.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for the streaming bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    pub chunk_size: usize,
    /// `None` waits for the sink indefinitely
    pub inactivity_timeout: Option<Duration>,
    pub content_type: String,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            inactivity_timeout: Some(DEFAULT_INACTIVITY_TIMEOUT),
            content_type: DEFAULT_AUDIO_CONTENT_TYPE.to_string(),
        }
    }
}

/// Outcome of one streamed request.
#[derive(Debug)]
pub struct StreamSummary {
    pub job_id: Option<String>,
    /// `None` when the job could not be started
    pub pull: Option<PullSummary>,
    pub termination: Option<Termination>,
    /// Completion watcher; resolves after the engine's terminal event and the
    /// job release
    pub completion: Option<JoinHandle<()>>,
    pub handle: Option<JobHandle>,
}

/// Drives one synthesis engine into streaming HTTP responses.
#[derive(Clone)]
pub struct SpeechStreamer {
    engine: Arc<dyn SynthesisEngine>,
    settings: StreamSettings,
    content_type: HeaderValue,
}

impl SpeechStreamer {
    /// A zero chunk size is raised to one byte, since an empty pull means the
    /// sink is exhausted. An unusable content type falls back to
    /// [`DEFAULT_AUDIO_CONTENT_TYPE`].
    pub fn new(engine: Arc<dyn SynthesisEngine>, mut settings: StreamSettings) -> Self {
        if settings.chunk_size == 0 {
            warn!("Streaming chunk size of zero raised to 1 byte");
            settings.chunk_size = 1;
        }

        let content_type = match HeaderValue::from_str(&settings.content_type) {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    content_type = %settings.content_type,
                    "Invalid streaming content type, using {DEFAULT_AUDIO_CONTENT_TYPE}"
                );
                settings.content_type = DEFAULT_AUDIO_CONTENT_TYPE.to_string();
                HeaderValue::from_static(DEFAULT_AUDIO_CONTENT_TYPE)
            }
        };

        Self {
            engine,
            settings,
            content_type,
        }
    }

    pub fn engine(&self) -> &Arc<dyn SynthesisEngine> {
        &self.engine
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Wrap `writer` in an arbiter with streaming headers already set.
    pub fn open<W: ResponseWriter>(&self, writer: W) -> Arc<TerminationArbiter<W>> {
        let arbiter = TerminationArbiter::new(writer);
        arbiter.set_header(CONTENT_TYPE, self.content_type.clone());
        arbiter.set_header(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        Arc::new(arbiter)
    }

    /// Synthesize `document` into the response guarded by `arbiter`.
    ///
    /// Returns once the pull loop has stopped. The completion watcher may
    /// still be running; it is returned in the summary.
    pub async fn stream<W>(
        &self,
        document: &SsmlDocument,
        arbiter: Arc<TerminationArbiter<W>>,
    ) -> StreamSummary
    where
        W: ResponseWriter + 'static,
    {
        let job = match self.engine.start(document).await {
            Ok(job) => job,
            Err(e) => {
                warn!(
                    engine = self.engine.name(),
                    voice = %document.voice(),
                    error = %e,
                    "Failed to start synthesis"
                );
                arbiter.fail(&e);
                return StreamSummary {
                    job_id: None,
                    pull: None,
                    termination: arbiter.termination(),
                    completion: None,
                    handle: None,
                };
            }
        };

        let job_id = job.id;
        let handle = job.handle;
        let mut sink = job.sink;

        debug!(
            job_id = %job_id,
            engine = self.engine.name(),
            voice = %document.voice(),
            "Synthesis job started"
        );

        let completion = tokio::spawn(watch_completion(
            job.completion,
            handle.clone(),
            arbiter.clone(),
            job_id.clone(),
        ));

        let pull = pull_audio(
            sink.as_mut(),
            &arbiter,
            self.settings.chunk_size,
            self.settings.inactivity_timeout,
        )
        .await;

        // The engine cannot finish delivering to a reader that stopped early
        if pull.end != PullEnd::Exhausted && handle.release() {
            debug!(job_id = %job_id, "Released synthesis job after early stop");
        }

        info!(
            job_id = %job_id,
            chunks = pull.chunks,
            bytes = pull.bytes,
            termination = ?arbiter.termination(),
            "Audio stream finished"
        );

        StreamSummary {
            job_id: Some(job_id),
            pull: Some(pull),
            termination: arbiter.termination(),
            completion: Some(completion),
            handle: Some(handle),
        }
    }
}

/// Wait for the engine's terminal event.
///
/// Success performs no transition: audio may still be buffered in the sink and
/// the pull loop decides when the body is complete. Only a reported failure
/// races the pull loop through the arbiter; an engine that drops the job
/// without reporting leaves the outcome to the sink. Either way the job is
/// released.
async fn watch_completion<W: ResponseWriter>(
    completion: oneshot::Receiver<EngineResult<()>>,
    handle: JobHandle,
    arbiter: Arc<TerminationArbiter<W>>,
    job_id: String,
) {
    match completion.await {
        Ok(Ok(())) => debug!(job_id = %job_id, "Engine reported synthesis complete"),
        Err(_) => debug!(job_id = %job_id, "Engine dropped the job without a terminal event"),
        Ok(Err(e)) => {
            if arbiter.fail(&e) {
                warn!(job_id = %job_id, error = %e, "Synthesis failed, response ended");
            } else {
                debug!(job_id = %job_id, error = %e, "Synthesis failure after response ended");
            }
        }
    }

    handle.release();
}
