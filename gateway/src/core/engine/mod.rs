//! Synthesis engine abstractions.
//!
//! An engine turns an SSML document into a [`SynthesisJob`]. A job exposes two
//! independently progressing things:
//!
//! - an [`AudioSink`] that is drained by pulling until a zero-length read
//! - a one-shot completion that reports success or failure at most once
//!
//! Neither implies anything about the other: an engine may report success while
//! audio is still buffered in the sink, and the sink may run dry before the
//! completion fires.

mod azure;
mod pipe;

pub use azure::{
    AZURE_OUTPUT_FORMAT_HEADER, AzureSpeechConfig, AzureSpeechEngine, DEFAULT_AZURE_REGION,
    azure_tts_url,
};
pub use pipe::{AudioPipeWriter, PullAudioStream, audio_pipe};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::ssml::SsmlDocument;

// =============================================================================
// Error Types
// =============================================================================

/// Errors reported by a synthesis engine or its output sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Engine is missing credentials or has an invalid configuration
    #[error("Invalid engine configuration: {0}")]
    InvalidConfiguration(String),

    /// Engine could not be reached
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Engine rejected the synthesis request
    #[error("Synthesis failed with status {status}: {message}")]
    SynthesisFailed { status: u16, message: String },

    /// Audio stream from the engine broke mid-way
    #[error("Audio stream error: {0}")]
    StreamError(String),

    /// Reading from the output sink failed
    #[error("Sink read failed: {0}")]
    SinkReadFailed(String),

    /// No audio arrived within the inactivity window
    #[error("No audio received for {0} ms")]
    Timeout(u64),

    /// Job was released before it finished
    #[error("Synthesis job cancelled")]
    Cancelled,
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Output Format
// =============================================================================

/// Raw, uncompressed, fixed-rate mono PCM formats the bridge can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PcmFormat {
    Raw8Khz16BitMono,
    #[default]
    Raw16Khz16BitMono,
    Raw24Khz16BitMono,
    Raw48Khz16BitMono,
}

impl PcmFormat {
    /// Azure `X-Microsoft-OutputFormat` value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw8Khz16BitMono => "raw-8khz-16bit-mono-pcm",
            Self::Raw16Khz16BitMono => "raw-16khz-16bit-mono-pcm",
            Self::Raw24Khz16BitMono => "raw-24khz-16bit-mono-pcm",
            Self::Raw48Khz16BitMono => "raw-48khz-16bit-mono-pcm",
        }
    }
}

// =============================================================================
// Sink and Job
// =============================================================================

/// Pull-style audio source of a synthesis job.
#[async_trait]
pub trait AudioSink: Send {
    /// Pull up to `max_bytes` of audio.
    ///
    /// An empty buffer signals that the sink is exhausted.
    async fn pull(&mut self, max_bytes: usize) -> EngineResult<Bytes>;
}

/// Releases the engine-side resources of one job.
///
/// Cloning shares the same underlying job; releasing is idempotent.
#[derive(Debug, Clone, Default)]
pub struct JobHandle {
    token: CancellationToken,
    released: Arc<AtomicBool>,
}

impl JobHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release the job. Returns true only for the call that performed the release.
    pub fn release(&self) -> bool {
        let first = !self.released.swap(true, Ordering::AcqRel);
        self.token.cancel();
        first
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Token engines observe to stop work once the job is released.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// A running synthesis job.
pub struct SynthesisJob {
    pub id: String,
    pub sink: Box<dyn AudioSink>,
    /// Fires at most once with the terminal event. A dropped sender reports
    /// nothing; the sink alone then decides how the response ends.
    pub completion: oneshot::Receiver<EngineResult<()>>,
    pub handle: JobHandle,
}

impl std::fmt::Debug for SynthesisJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisJob")
            .field("id", &self.id)
            .field("released", &self.handle.is_released())
            .finish()
    }
}

/// An external speech synthesis engine.
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &'static str;

    /// PCM format the engine is configured to produce.
    fn output_format(&self) -> PcmFormat;

    /// Start synthesizing `document` asynchronously.
    ///
    /// Returning `Err` means no job was created and nothing needs releasing.
    async fn start(&self, document: &SsmlDocument) -> EngineResult<SynthesisJob>;
}
