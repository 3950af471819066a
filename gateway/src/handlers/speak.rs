//! Streaming text-to-speech endpoint.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use http::{HeaderName, HeaderValue};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::response_channel::response_channel;
use crate::core::metering::count_characters;
use crate::core::ssml::SsmlDocument;
use crate::core::voice::VoiceGender;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request body for `POST /tts/stream`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakStreamRequest {
    /// Text to synthesize
    #[serde(default)]
    pub text: Option<String>,
    /// "male" or "female"; anything else falls back to the female default
    #[serde(default, alias = "voice_gender")]
    pub voice_gender: Option<String>,
    /// Short form (e.g. "JennyNeural") or locale-qualified voice id
    #[serde(default, alias = "voice_name")]
    pub voice_name: Option<String>,
}

/// Synthesize text and stream raw PCM audio as it is produced.
///
/// Validation errors and engine failures before the first audio byte are
/// answered with a JSON error body. Once audio has started flowing the status
/// is fixed, so a later failure closes the connection instead.
pub async fn speak_stream_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SpeakStreamRequest>, JsonRejection>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut response = match start_stream(&state, payload, &request_id).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

async fn start_stream(
    state: &Arc<AppState>,
    payload: Result<Json<SpeakStreamRequest>, JsonRejection>,
    request_id: &str,
) -> AppResult<Response> {
    let Json(request) = payload.map_err(|e| AppError::InvalidInput(e.body_text()))?;

    let text = request.text.unwrap_or_default();
    let gender = request
        .voice_gender
        .as_deref()
        .map(VoiceGender::from_str_or_default)
        .unwrap_or_default();
    let voice = state.voices.resolve(request.voice_name.as_deref(), gender);

    // Rejects empty text before any engine resource exists
    let document = SsmlDocument::build(&text, &voice)?;
    let streamer = state.streamer()?.clone();

    let characters = count_characters(&text);
    state.meter.record_characters(request_id, characters);

    info!(
        request_id = %request_id,
        voice = %voice,
        gender = %gender,
        characters,
        "Starting speech stream"
    );

    let (writer, head) = response_channel();
    let arbiter = streamer.open(writer);

    let task_request_id = request_id.to_string();
    tokio::spawn(async move {
        let summary = streamer.stream(&document, arbiter).await;
        debug!(
            request_id = %task_request_id,
            job_id = ?summary.job_id,
            termination = ?summary.termination,
            "Speech stream task finished"
        );
    });

    head.await
        .map(IntoResponse::into_response)
        .map_err(|_| AppError::Internal("Speech stream ended without a response".to_string()))
}
