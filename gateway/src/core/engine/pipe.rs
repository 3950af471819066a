//! Bounded audio pipe bridging push-style producers into the pull contract.
//!
//! Engines that receive audio as a stream of frames push them into an
//! [`AudioPipeWriter`]; the bridge drains the matching [`PullAudioStream`] in
//! chunks of at most the requested size. Dropping the writer closes the pipe,
//! after which buffered audio is still delivered before the final empty pull.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::{AudioSink, EngineError, EngineResult};

/// Create a pipe holding at most `capacity` pending frames.
pub fn audio_pipe(capacity: usize) -> (AudioPipeWriter, PullAudioStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        AudioPipeWriter { tx },
        PullAudioStream {
            rx,
            pending: Bytes::new(),
        },
    )
}

/// Frame sent through the pipe.
#[derive(Debug)]
enum Frame {
    Audio(Bytes),
    Failed(EngineError),
}

/// Producer half of an audio pipe.
#[derive(Debug, Clone)]
pub struct AudioPipeWriter {
    tx: mpsc::Sender<Frame>,
}

impl AudioPipeWriter {
    /// Push a frame, waiting for room. Empty frames are skipped so they can
    /// never be mistaken for end-of-audio.
    pub async fn write(&self, audio: Bytes) -> EngineResult<()> {
        if audio.is_empty() {
            return Ok(());
        }
        self.tx
            .send(Frame::Audio(audio))
            .await
            .map_err(|_| EngineError::SinkReadFailed("audio pipe reader dropped".to_string()))
    }

    /// Make the next pull after buffered audio fail with `error`.
    pub async fn fail(&self, error: EngineError) {
        let _ = self.tx.send(Frame::Failed(error)).await;
    }
}

/// Consumer half of an audio pipe.
#[derive(Debug)]
pub struct PullAudioStream {
    rx: mpsc::Receiver<Frame>,
    pending: Bytes,
}

#[async_trait]
impl AudioSink for PullAudioStream {
    async fn pull(&mut self, max_bytes: usize) -> EngineResult<Bytes> {
        if max_bytes == 0 {
            return Ok(Bytes::new());
        }

        if self.pending.is_empty() {
            match self.rx.recv().await {
                Some(Frame::Audio(audio)) => self.pending = audio,
                Some(Frame::Failed(err)) => return Err(err),
                None => return Ok(Bytes::new()),
            }
        }

        let take = max_bytes.min(self.pending.len());
        Ok(self.pending.split_to(take))
    }
}
