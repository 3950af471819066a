//! HTTP API tests
//!
//! Exercise `POST /tts/stream` through the router with a scripted engine
//! behind the real channel-backed response writer.

mod mock_engine;

use std::sync::Arc;

use axum::{Router, body::Body, http::Request, routing::get};
use http::StatusCode;
use http::header::{CONTENT_TYPE, TRANSFER_ENCODING};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tower::util::ServiceExt;

use mock_engine::{CompletionPlan, Script, ScriptedEngine, expected_audio};
use speech_gateway::core::engine::EngineError;
use speech_gateway::core::metering::UsageMeter;
use speech_gateway::core::voice::VoiceTable;
use speech_gateway::{ServerConfig, handlers, routes, state::AppState};

/// Minimal configuration that never touches the environment
fn create_test_config() -> ServerConfig {
    let voices = VoiceTable::default();
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 3001,
        tls: None,
        azure_speech_subscription_key: None,
        azure_speech_region: "eastus".to_string(),
        azure_speech_endpoint: None,
        voice_male_default: voices.male_default,
        voice_female_default: voices.female_default,
        voice_aliases: voices.aliases,
        stream_chunk_size: 4096,
        stream_inactivity_timeout_seconds: 5,
        stream_content_type: "audio/wav".to_string(),
        metering_url: None,
        cors_allowed_origins: None,
        rate_limit_requests_per_second: 100000,
        rate_limit_burst_size: 10,
    }
}

#[derive(Default)]
struct CountingMeter {
    records: Mutex<Vec<(String, usize)>>,
}

impl UsageMeter for CountingMeter {
    fn record_characters(&self, request_id: &str, characters: usize) {
        self.records
            .lock()
            .push((request_id.to_string(), characters));
    }
}

fn app(engine: Arc<ScriptedEngine>, meter: Arc<CountingMeter>) -> Router {
    let state = AppState::with_engine(create_test_config(), engine, meter);
    Router::new()
        .route("/", get(handlers::api::health_check))
        .merge(routes::api::create_api_router())
        .with_state(state)
}

fn speak_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/tts/stream")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let engine = ScriptedEngine::new(Script::chunks(&[]));
    let response = app(engine, Arc::default())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "status": "OK" }));
}

#[tokio::test]
async fn test_stream_returns_audio_in_order() {
    let engine = ScriptedEngine::new(Script::chunks(&[10, 10, 5]));
    let meter = Arc::new(CountingMeter::default());

    let response = app(engine.clone(), meter.clone())
        .oneshot(speak_request(json!({ "text": "Hello world" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "audio/wav");
    assert_eq!(response.headers()[TRANSFER_ENCODING], "chunked");
    let request_id = response.headers()["x-request-id"]
        .to_str()
        .unwrap()
        .to_string();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.to_vec(), expected_audio(&[10, 10, 5]));

    assert_eq!(engine.start_count(), 1);
    let records = meter.records.lock();
    assert_eq!(records.as_slice(), &[(request_id, 11)]);
}

#[tokio::test]
async fn test_empty_text_is_rejected_without_engine_call() {
    for body in [json!({ "text": "" }), json!({ "text": "   " }), json!({})] {
        let engine = ScriptedEngine::new(Script::chunks(&[10]));
        let meter = Arc::new(CountingMeter::default());

        let response = app(engine.clone(), meter.clone())
            .oneshot(speak_request(body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(json_body(response).await, json!({ "error": "Text is required" }));
        assert_eq!(engine.start_count(), 0);
        assert!(meter.records.lock().is_empty());
    }
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let engine = ScriptedEngine::new(Script::chunks(&[]));
    let request = Request::builder()
        .method("POST")
        .uri("/tts/stream")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();

    let response = app(engine.clone(), Arc::default())
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
    assert_eq!(engine.start_count(), 0);
}

#[tokio::test]
async fn test_pre_stream_failure_returns_json_error() {
    let engine = ScriptedEngine::new(
        Script::chunks(&[10])
            .with_completion(CompletionPlan::FailAtStart(EngineError::SynthesisFailed {
                status: 401,
                message: "bad key".to_string(),
            })),
    );

    let response = app(engine, Arc::default())
        .oneshot(speak_request(json!({ "text": "Hello" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Speech synthesis failed" })
    );
}

#[tokio::test]
async fn test_start_failure_returns_json_error() {
    let engine = ScriptedEngine::failing_start(EngineError::ConnectionFailed("down".to_string()));

    let response = app(engine, Arc::default())
        .oneshot(speak_request(json!({ "text": "Hello" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Speech synthesis failed" })
    );
}

#[tokio::test]
async fn test_mid_stream_failure_breaks_body() {
    let engine = ScriptedEngine::new(
        Script::chunks(&[16, 16]).with_completion(CompletionPlan::FailAfterChunks(
            EngineError::StreamError("reset".to_string()),
        )),
    );

    let response = app(engine, Arc::default())
        .oneshot(speak_request(json!({ "text": "Hello" })))
        .await
        .unwrap();

    // Status was committed with the first chunk
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.into_body().collect().await.is_err());
}

#[tokio::test]
async fn test_short_form_voice_ignores_gender() {
    let engine = ScriptedEngine::new(Script::chunks(&[2]));

    let response = app(engine.clone(), Arc::default())
        .oneshot(speak_request(json!({
            "text": "Hi",
            "voiceName": "FableNeural",
            "voiceGender": "male"
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.into_body().collect().await.unwrap();

    let documents = engine.documents();
    assert_eq!(documents.len(), 1);
    assert!(documents[0].contains(r#"<voice name="en-US-FableNeural">"#));
}

#[tokio::test]
async fn test_gender_defaults_and_aliases() {
    let cases = [
        (json!({ "text": "Hi", "voiceGender": "male" }), "en-US-AndrewNeural"),
        (json!({ "text": "Hi", "voice_gender": "female" }), "en-US-JennyNeural"),
        (json!({ "text": "Hi" }), "en-US-JennyNeural"),
        (
            json!({ "text": "Hi", "voice_name": "en-US-Alloy:DragonHDLatestNeural" }),
            "en-US-Alloy:DragonHDLatestNeural",
        ),
        (json!({ "text": "Hi", "voiceName": "Unknown", "voiceGender": "male" }), "en-US-AndrewNeural"),
    ];

    for (body, expected_voice) in cases {
        let engine = ScriptedEngine::new(Script::chunks(&[2]));
        let response = app(engine.clone(), Arc::default())
            .oneshot(speak_request(body))
            .await
            .unwrap();
        response.into_body().collect().await.unwrap();

        let documents = engine.documents();
        assert!(
            documents[0].contains(&format!(r#"<voice name="{expected_voice}">"#)),
            "expected {expected_voice} in {}",
            documents[0]
        );
    }
}

#[tokio::test]
async fn test_text_is_escaped_in_markup() {
    let engine = ScriptedEngine::new(Script::chunks(&[2]));

    let response = app(engine.clone(), Arc::default())
        .oneshot(speak_request(json!({ "text": "Tom & Jerry <3" })))
        .await
        .unwrap();
    response.into_body().collect().await.unwrap();

    assert!(engine.documents()[0].contains("Tom &amp; Jerry &lt;3"));
}

#[tokio::test]
async fn test_engine_not_configured_is_service_unavailable() {
    let config = create_test_config();
    let app = Router::new()
        .merge(routes::api::create_api_router())
        .with_state(AppState::new(config));

    let response = app
        .oneshot(speak_request(json!({ "text": "Hello" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Speech engine is not configured" })
    );
}
