//! Microsoft Azure Speech synthesis engine.
//!
//! Synthesis requests are POSTed as SSML to the regional REST endpoint with a
//! raw PCM output format. The response body is streamed frame by frame into an
//! audio pipe while a background task reports the terminal event.
//!
//! - Endpoint: `https://{region}.tts.speech.microsoft.com/cognitiveservices/v1`
//! - Headers: `Ocp-Apim-Subscription-Key`, `Content-Type: application/ssml+xml`,
//!   `X-Microsoft-OutputFormat`

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use super::{
    AudioPipeWriter, EngineError, EngineResult, JobHandle, PcmFormat, SynthesisEngine,
    SynthesisJob, audio_pipe,
};
use crate::core::ssml::SsmlDocument;

/// Header selecting the audio output format.
pub const AZURE_OUTPUT_FORMAT_HEADER: &str = "X-Microsoft-OutputFormat";

/// Default Azure region when none is configured.
pub const DEFAULT_AZURE_REGION: &str = "eastus";

/// Frames buffered between the HTTP stream and the pull loop.
const PIPE_CAPACITY: usize = 64;

const USER_AGENT: &str = concat!("speech-gateway/", env!("CARGO_PKG_VERSION"));

/// Regional synthesis endpoint.
pub fn azure_tts_url(region: &str) -> String {
    format!("https://{region}.tts.speech.microsoft.com/cognitiveservices/v1")
}

/// Azure engine configuration.
#[derive(Clone)]
pub struct AzureSpeechConfig {
    pub subscription_key: Zeroizing<String>,
    pub region: String,
    /// Overrides the regional endpoint (private endpoints, tests)
    pub endpoint: Option<String>,
    pub output_format: PcmFormat,
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for AzureSpeechConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureSpeechConfig")
            .field("subscription_key", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("output_format", &self.output_format)
            .finish()
    }
}

impl Default for AzureSpeechConfig {
    fn default() -> Self {
        Self {
            subscription_key: Zeroizing::new(String::new()),
            region: DEFAULT_AZURE_REGION.to_string(),
            endpoint: None,
            output_format: PcmFormat::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl AzureSpeechConfig {
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| azure_tts_url(&self.region))
    }
}

/// Azure Speech engine backed by the REST synthesis API.
pub struct AzureSpeechEngine {
    config: AzureSpeechConfig,
    client: reqwest::Client,
    job_counter: AtomicU64,
}

impl AzureSpeechEngine {
    pub fn new(config: AzureSpeechConfig) -> EngineResult<Self> {
        if config.subscription_key.trim().is_empty() {
            return Err(EngineError::InvalidConfiguration(
                "Azure Speech subscription key is not configured".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| EngineError::InvalidConfiguration(format!("HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            job_counter: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &AzureSpeechConfig {
        &self.config
    }

    fn build_request(&self, document: &SsmlDocument) -> reqwest::RequestBuilder {
        self.client
            .post(self.config.endpoint_url())
            .header(
                "Ocp-Apim-Subscription-Key",
                self.config.subscription_key.as_str(),
            )
            .header("Content-Type", "application/ssml+xml")
            .header(AZURE_OUTPUT_FORMAT_HEADER, self.config.output_format.as_str())
            .body(document.as_str().to_string())
    }
}

#[async_trait]
impl SynthesisEngine for AzureSpeechEngine {
    fn name(&self) -> &'static str {
        "azure"
    }

    fn output_format(&self) -> PcmFormat {
        self.config.output_format
    }

    async fn start(&self, document: &SsmlDocument) -> EngineResult<SynthesisJob> {
        let job_number = self.job_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let job_id = format!("azure-{job_number}");

        let (writer, sink) = audio_pipe(PIPE_CAPACITY);
        let (completion_tx, completion_rx) = oneshot::channel();
        let handle = JobHandle::new();
        let token = handle.cancellation_token();
        let request = self.build_request(document);

        debug!(
            job_id = %job_id,
            voice = %document.voice(),
            format = self.config.output_format.as_str(),
            "Starting Azure synthesis"
        );

        let task_job_id = job_id.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                result = run_synthesis(request, &writer, &task_job_id) => result,
                _ = token.cancelled() => Err(EngineError::Cancelled),
            };

            // The sink must report the failure too, otherwise closing the pipe
            // would read as a clean end of audio.
            if let Err(e) = &result
                && *e != EngineError::Cancelled
            {
                writer.fail(e.clone()).await;
            }
            drop(writer);

            match &result {
                Ok(()) => info!(job_id = %task_job_id, "Azure synthesis completed"),
                Err(EngineError::Cancelled) => {
                    debug!(job_id = %task_job_id, "Azure synthesis released before completion")
                }
                Err(e) => warn!(job_id = %task_job_id, error = %e, "Azure synthesis failed"),
            }

            let _ = completion_tx.send(result);
        });

        Ok(SynthesisJob {
            id: job_id,
            sink: Box::new(sink),
            completion: completion_rx,
            handle,
        })
    }
}

/// Send the request and stream the response body into `writer`.
async fn run_synthesis(
    request: reqwest::RequestBuilder,
    writer: &AudioPipeWriter,
    job_id: &str,
) -> EngineResult<()> {
    let response = request.send().await.map_err(|e| {
        error!(job_id = %job_id, error = %e, "Azure TTS request failed");
        EngineError::ConnectionFailed(e.to_string())
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(
            job_id = %job_id,
            status = %status,
            body = %body,
            "Azure TTS API returned error"
        );
        let message = match status.as_u16() {
            400 => format!("Bad request - check SSML and voice name: {body}"),
            401 | 403 => "Authentication failed - check subscription key and region".to_string(),
            429 => "Rate limit exceeded".to_string(),
            _ => body,
        };
        return Err(EngineError::SynthesisFailed {
            status: status.as_u16(),
            message,
        });
    }

    let mut stream = response.bytes_stream();
    let mut total_bytes = 0usize;
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(audio) => {
                total_bytes += audio.len();
                if writer.write(audio).await.is_err() {
                    debug!(job_id = %job_id, "Audio sink dropped, stopping synthesis stream");
                    return Err(EngineError::Cancelled);
                }
            }
            Err(e) => return Err(EngineError::StreamError(e.to_string())),
        }
    }

    debug!(job_id = %job_id, bytes = total_bytes, "Azure audio stream finished");
    Ok(())
}
