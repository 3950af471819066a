//! Streaming synthesis: response arbitration, pull loop and bridge.

mod arbiter;
mod bridge;
mod pull;
mod response;

pub use arbiter::{
    ResponseState, SYNTHESIS_FAILED_MESSAGE, SYNTHESIS_FAILED_STATUS, Termination,
    TerminationArbiter, WriteOutcome,
};
pub use bridge::{
    DEFAULT_AUDIO_CONTENT_TYPE, DEFAULT_CHUNK_SIZE, DEFAULT_INACTIVITY_TIMEOUT, SpeechStreamer,
    StreamSettings, StreamSummary,
};
pub use pull::{PullEnd, PullSummary, pull_audio};
pub use response::{ClientDisconnected, ResponseWriter};
