use axum::{Router, routing::post};
use tower_http::trace::TraceLayer;

use crate::handlers::speak;
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tts/stream", post(speak::speak_stream_handler))
        .layer(TraceLayer::new_for_http())
}
