pub mod engine;
pub mod metering;
pub mod ssml;
pub mod streaming;
pub mod voice;

// Re-export commonly used types for convenience
pub use engine::{
    AudioSink, AzureSpeechConfig, AzureSpeechEngine, EngineError, EngineResult, JobHandle,
    PcmFormat, SynthesisEngine, SynthesisJob,
};
pub use metering::{HttpUsageMeter, LogUsageMeter, UsageMeter};
pub use ssml::{MarkupError, SsmlDocument};
pub use streaming::{
    ResponseState, ResponseWriter, SpeechStreamer, StreamSettings, Termination,
    TerminationArbiter,
};
pub use voice::{VoiceGender, VoiceId, VoiceTable};
