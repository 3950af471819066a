use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::core::ssml::MarkupError;

/// Errors a handler can return before a response has started streaming.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Speech engine is not configured")]
    EngineNotConfigured,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::EngineNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent in the JSON body.
    pub fn client_message(&self) -> String {
        match self {
            AppError::InvalidInput(message) => message.clone(),
            AppError::EngineNotConfigured => self.to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl From<MarkupError> for AppError {
    fn from(err: MarkupError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        (status, Json(json!({ "error": self.client_message() }))).into_response()
    }
}
