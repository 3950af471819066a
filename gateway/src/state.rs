//! Shared application state.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::engine::{AzureSpeechEngine, SynthesisEngine};
use crate::core::metering::{HttpUsageMeter, LogUsageMeter, UsageMeter};
use crate::core::streaming::SpeechStreamer;
use crate::core::voice::VoiceTable;
use crate::errors::{AppError, AppResult};

/// State shared by every request handler.
pub struct AppState {
    pub config: ServerConfig,
    pub voices: VoiceTable,
    /// `None` when no speech engine could be configured
    streamer: Option<SpeechStreamer>,
    pub meter: Arc<dyn UsageMeter>,
}

impl AppState {
    /// Build state from configuration, wiring the Azure engine when
    /// credentials are present.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let engine: Option<Arc<dyn SynthesisEngine>> = match config.azure_speech_config() {
            Some(azure) => match AzureSpeechEngine::new(azure) {
                Ok(engine) => {
                    info!(region = %config.azure_speech_region, "Azure speech engine configured");
                    Some(Arc::new(engine))
                }
                Err(e) => {
                    warn!(error = %e, "Failed to configure Azure speech engine");
                    None
                }
            },
            None => {
                warn!("AZURE_SPEECH_SUBSCRIPTION_KEY not set, speech synthesis disabled");
                None
            }
        };

        let meter = build_meter(&config);
        Self::build(config, engine, meter)
    }

    /// Build state around an explicit engine and meter.
    pub fn with_engine(
        config: ServerConfig,
        engine: Arc<dyn SynthesisEngine>,
        meter: Arc<dyn UsageMeter>,
    ) -> Arc<Self> {
        Self::build(config, Some(engine), meter)
    }

    fn build(
        config: ServerConfig,
        engine: Option<Arc<dyn SynthesisEngine>>,
        meter: Arc<dyn UsageMeter>,
    ) -> Arc<Self> {
        let voices = config.voice_table();
        let settings = config.stream_settings();
        let streamer = engine.map(|engine| SpeechStreamer::new(engine, settings));

        Arc::new(Self {
            config,
            voices,
            streamer,
            meter,
        })
    }

    pub fn streamer(&self) -> AppResult<&SpeechStreamer> {
        self.streamer.as_ref().ok_or(AppError::EngineNotConfigured)
    }
}

fn build_meter(config: &ServerConfig) -> Arc<dyn UsageMeter> {
    if let Some(url) = &config.metering_url {
        match HttpUsageMeter::new(url.clone()) {
            Ok(meter) => {
                info!(url = %url, "Usage metering enabled");
                return Arc::new(meter);
            }
            Err(e) => warn!(error = %e, "Failed to build usage meter, falling back to logs"),
        }
    }
    Arc::new(LogUsageMeter)
}
