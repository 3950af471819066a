//! Usage metering for synthesized characters.
//!
//! Metering is fire-and-forget: recording never blocks the request and a
//! failing meter never affects synthesis.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

/// Records how many characters a request asked to synthesize.
pub trait UsageMeter: Send + Sync {
    fn record_characters(&self, request_id: &str, characters: usize);
}

/// Meter that only emits a tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogUsageMeter;

impl UsageMeter for LogUsageMeter {
    fn record_characters(&self, request_id: &str, characters: usize) {
        info!(request_id = %request_id, characters, "TTS usage");
    }
}

#[derive(Debug, Serialize)]
struct UsageRecord<'a> {
    request_id: &'a str,
    service: &'static str,
    characters: usize,
}

/// Meter that POSTs a JSON usage record to a collector endpoint.
#[derive(Debug, Clone)]
pub struct HttpUsageMeter {
    client: reqwest::Client,
    url: String,
}

impl HttpUsageMeter {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl UsageMeter for HttpUsageMeter {
    fn record_characters(&self, request_id: &str, characters: usize) {
        let body = match serde_json::to_value(UsageRecord {
            request_id,
            service: "tts",
            characters,
        }) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to encode usage record");
                return;
            }
        };

        let request = self.client.post(&self.url).json(&body);
        let request_id = request_id.to_string();
        tokio::spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(request_id = %request_id, characters, "Usage recorded");
                }
                Ok(response) => warn!(
                    request_id = %request_id,
                    status = %response.status(),
                    "Usage collector rejected record"
                ),
                Err(e) => warn!(request_id = %request_id, error = %e, "Failed to record usage"),
            }
        });
    }
}

/// Character count used for metering.
pub fn count_characters(text: &str) -> usize {
    text.chars().count()
}
