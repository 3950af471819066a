//! Scripted synthesis engine and recording response writer
//!
//! The engine replays a fixed list of audio chunks and fires its completion
//! at a scripted point. Failures that race the pull loop are made
//! deterministic by having the sink wait for the job release (which the
//! completion watcher performs after it has reported the failure).

// Not every test binary uses every helper
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use speech_gateway::core::engine::{
    AudioSink, EngineError, EngineResult, JobHandle, PcmFormat, SynthesisEngine, SynthesisJob,
};
use speech_gateway::core::ssml::SsmlDocument;
use speech_gateway::core::streaming::{ClientDisconnected, ResponseWriter};

/// When the engine reports its terminal event.
#[derive(Debug, Clone)]
pub enum CompletionPlan {
    /// Success is reported as soon as the job starts
    SucceedAtStart,
    /// Failure is reported before the first pull
    FailAtStart(EngineError),
    /// Failure is reported once all scripted chunks have been pulled
    FailAfterChunks(EngineError),
    /// The test fires the completion through [`ScriptedEngine::take_completion`]
    Manual,
    /// The sender is dropped without reporting anything
    Dropped,
}

/// What the sink does once its chunks run out.
#[derive(Debug, Clone)]
pub enum SinkEnd {
    /// Zero-length pull
    Exhausted,
    /// Pull error
    Error(EngineError),
    /// Pull never resolves
    Stall,
}

#[derive(Debug, Clone)]
pub struct Script {
    pub chunks: Vec<usize>,
    pub completion: CompletionPlan,
    pub end: SinkEnd,
    /// Sleep before every pull
    pub pull_delay: Option<Duration>,
    /// After this many chunks, the next pull waits for the job release
    pub pause_after: Option<usize>,
}

impl Script {
    pub fn chunks(sizes: &[usize]) -> Self {
        Self {
            chunks: sizes.to_vec(),
            completion: CompletionPlan::SucceedAtStart,
            end: SinkEnd::Exhausted,
            pull_delay: None,
            pause_after: None,
        }
    }

    pub fn with_pull_delay(mut self, delay: Duration) -> Self {
        self.pull_delay = Some(delay);
        self
    }

    pub fn pausing_after(mut self, chunks: usize) -> Self {
        self.pause_after = Some(chunks);
        self
    }

    pub fn with_completion(mut self, completion: CompletionPlan) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_end(mut self, end: SinkEnd) -> Self {
        self.end = end;
        self
    }
}

/// Chunk `index` of length `len`; every chunk carries distinct bytes.
pub fn chunk_bytes(index: usize, len: usize) -> Bytes {
    Bytes::from(
        (0..len)
            .map(|i| (index * 31 + i) as u8)
            .collect::<Vec<u8>>(),
    )
}

/// Concatenation of all scripted chunks.
pub fn expected_audio(sizes: &[usize]) -> Vec<u8> {
    sizes
        .iter()
        .enumerate()
        .flat_map(|(i, len)| chunk_bytes(i, *len).to_vec())
        .collect()
}

struct ScriptedSink {
    chunks: VecDeque<Bytes>,
    end: SinkEnd,
    /// Held when the failure fires after the last chunk
    pending_failure: Option<(EngineError, oneshot::Sender<EngineResult<()>>)>,
    /// Wait for the release before the first pull
    wait_for_release: bool,
    pull_delay: Option<Duration>,
    pause_after: Option<usize>,
    delivered: usize,
    released: CancellationToken,
    pulls: Arc<AtomicUsize>,
}

#[async_trait]
impl AudioSink for ScriptedSink {
    async fn pull(&mut self, max_bytes: usize) -> EngineResult<Bytes> {
        self.pulls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.pull_delay {
            tokio::time::sleep(delay).await;
        }

        if self.pause_after == Some(self.delivered) {
            self.pause_after = None;
            self.released.cancelled().await;
        }

        if self.wait_for_release {
            self.wait_for_release = false;
            self.released.cancelled().await;
            return Ok(Bytes::new());
        }

        if let Some(chunk) = self.chunks.front_mut() {
            self.delivered += 1;
            if chunk.len() > max_bytes {
                return Ok(chunk.split_to(max_bytes));
            }
            return Ok(self.chunks.pop_front().unwrap_or_default());
        }

        if let Some((error, tx)) = self.pending_failure.take() {
            let _ = tx.send(Err(error));
            self.released.cancelled().await;
            return Ok(Bytes::new());
        }

        match &self.end {
            SinkEnd::Exhausted => Ok(Bytes::new()),
            SinkEnd::Error(e) => Err(e.clone()),
            SinkEnd::Stall => {
                std::future::pending::<()>().await;
                Ok(Bytes::new())
            }
        }
    }
}

/// Engine that replays a [`Script`] for every job.
pub struct ScriptedEngine {
    script: Script,
    start_error: Option<EngineError>,
    starts: AtomicUsize,
    pulls: Arc<AtomicUsize>,
    completions: Mutex<Vec<oneshot::Sender<EngineResult<()>>>>,
    handles: Mutex<Vec<JobHandle>>,
    documents: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            start_error: None,
            starts: AtomicUsize::new(0),
            pulls: Arc::new(AtomicUsize::new(0)),
            completions: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            documents: Mutex::new(Vec::new()),
        })
    }

    /// Engine whose `start` always fails.
    pub fn failing_start(error: EngineError) -> Arc<Self> {
        Arc::new(Self {
            script: Script::chunks(&[]),
            start_error: Some(error),
            starts: AtomicUsize::new(0),
            pulls: Arc::new(AtomicUsize::new(0)),
            completions: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            documents: Mutex::new(Vec::new()),
        })
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    /// Completion sender of the oldest job started with [`CompletionPlan::Manual`].
    pub fn take_completion(&self) -> Option<oneshot::Sender<EngineResult<()>>> {
        let mut completions = self.completions.lock();
        if completions.is_empty() {
            None
        } else {
            Some(completions.remove(0))
        }
    }

    pub fn handles(&self) -> Vec<JobHandle> {
        self.handles.lock().clone()
    }

    /// SSML documents passed to `start`, in order.
    pub fn documents(&self) -> Vec<String> {
        self.documents.lock().clone()
    }
}

#[async_trait]
impl SynthesisEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn output_format(&self) -> PcmFormat {
        PcmFormat::default()
    }

    async fn start(&self, document: &SsmlDocument) -> EngineResult<SynthesisJob> {
        let job_number = self.starts.fetch_add(1, Ordering::SeqCst);
        self.documents.lock().push(document.as_str().to_string());

        if let Some(error) = &self.start_error {
            return Err(error.clone());
        }

        let handle = JobHandle::new();
        self.handles.lock().push(handle.clone());
        let (tx, rx) = oneshot::channel();

        let mut sink = ScriptedSink {
            chunks: self
                .script
                .chunks
                .iter()
                .enumerate()
                .map(|(i, len)| chunk_bytes(i, *len))
                .collect(),
            end: self.script.end.clone(),
            pending_failure: None,
            wait_for_release: false,
            pull_delay: self.script.pull_delay,
            pause_after: self.script.pause_after,
            delivered: 0,
            released: handle.cancellation_token(),
            pulls: self.pulls.clone(),
        };

        match &self.script.completion {
            CompletionPlan::SucceedAtStart => {
                let _ = tx.send(Ok(()));
            }
            CompletionPlan::FailAtStart(error) => {
                let _ = tx.send(Err(error.clone()));
                sink.wait_for_release = true;
            }
            CompletionPlan::FailAfterChunks(error) => {
                sink.pending_failure = Some((error.clone(), tx));
            }
            CompletionPlan::Manual => self.completions.lock().push(tx),
            CompletionPlan::Dropped => drop(tx),
        }

        Ok(SynthesisJob {
            id: format!("scripted-{job_number}"),
            sink: Box::new(sink),
            completion: rx,
            handle,
        })
    }
}

// =============================================================================
// Recording writer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum WriterEvent {
    Chunk(usize),
    End,
    Error(StatusCode, serde_json::Value),
    Abort,
}

#[derive(Debug, Default)]
pub struct WriterLog {
    pub headers: HeaderMap,
    pub events: Vec<WriterEvent>,
    pub body: Vec<u8>,
    pub committed: bool,
}

impl WriterLog {
    /// Events that finalize a response.
    pub fn terminal_events(&self) -> usize {
        self.events
            .iter()
            .filter(|e| !matches!(e, WriterEvent::Chunk(_)))
            .count()
    }
}

/// Writer that records everything into a shared log.
#[derive(Debug, Clone, Default)]
pub struct RecordingWriter {
    pub log: Arc<Mutex<WriterLog>>,
    /// Fail writes once this many chunks have been accepted
    pub disconnect_after: Option<usize>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disconnecting_after(chunks: usize) -> Self {
        Self {
            disconnect_after: Some(chunks),
            ..Self::default()
        }
    }
}

impl ResponseWriter for RecordingWriter {
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.log.lock().headers.insert(name, value);
    }

    fn headers_sent(&self) -> bool {
        self.log.lock().committed
    }

    fn write(&mut self, chunk: Bytes) -> Result<(), ClientDisconnected> {
        let mut log = self.log.lock();
        let written = log
            .events
            .iter()
            .filter(|e| matches!(e, WriterEvent::Chunk(_)))
            .count();
        if self.disconnect_after.is_some_and(|limit| written >= limit) {
            return Err(ClientDisconnected);
        }

        log.committed = true;
        log.events.push(WriterEvent::Chunk(chunk.len()));
        log.body.extend_from_slice(&chunk);
        Ok(())
    }

    fn end(&mut self) {
        let mut log = self.log.lock();
        log.committed = true;
        log.events.push(WriterEvent::End);
    }

    fn send_error(&mut self, status: StatusCode, body: serde_json::Value) {
        let mut log = self.log.lock();
        log.committed = true;
        log.events.push(WriterEvent::Error(status, body));
    }

    fn abort(&mut self, _reason: &str) {
        self.log.lock().events.push(WriterEvent::Abort);
    }
}
