//! HTTP request handlers
//!
//! - `api` - Health check endpoint
//! - `speak` - Streaming text-to-speech endpoint
//! - `response_channel` - Response writer bridging the streaming core into axum

pub mod api;
pub mod response_channel;
pub mod speak;

pub use speak::speak_stream_handler;
