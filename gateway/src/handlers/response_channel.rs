//! Channel-backed [`ResponseWriter`] for axum handlers.
//!
//! The streaming bridge runs in a background task while the handler waits for
//! the response head. The first write (or an error) commits the head through a
//! oneshot; body chunks follow over an unbounded channel so that writes never
//! block while the termination gate is held.

use std::io;

use axum::{
    Json,
    body::Body,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::core::streaming::{ClientDisconnected, ResponseWriter};

type BodyItem = Result<Bytes, io::Error>;

/// Committed response head handed to the handler.
#[derive(Debug)]
pub enum ResponseHead {
    Stream {
        headers: HeaderMap,
        body: mpsc::UnboundedReceiver<BodyItem>,
    },
    Error {
        status: StatusCode,
        body: serde_json::Value,
    },
}

impl IntoResponse for ResponseHead {
    fn into_response(self) -> Response {
        match self {
            ResponseHead::Stream { headers, mut body } => {
                let stream = async_stream::stream! {
                    while let Some(item) = body.recv().await {
                        yield item;
                    }
                };
                let mut response = Response::new(Body::from_stream(stream));
                *response.headers_mut() = headers;
                response
            }
            ResponseHead::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

/// Writer half of a response channel.
#[derive(Debug)]
pub struct ChannelResponseWriter {
    headers: HeaderMap,
    head_tx: Option<oneshot::Sender<ResponseHead>>,
    body_tx: Option<mpsc::UnboundedSender<BodyItem>>,
    body_rx: Option<mpsc::UnboundedReceiver<BodyItem>>,
}

/// Create a writer and the receiver its committed head arrives on.
pub fn response_channel() -> (ChannelResponseWriter, oneshot::Receiver<ResponseHead>) {
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::unbounded_channel();
    let writer = ChannelResponseWriter {
        headers: HeaderMap::new(),
        head_tx: Some(head_tx),
        body_tx: Some(body_tx),
        body_rx: Some(body_rx),
    };
    (writer, head_rx)
}

impl ChannelResponseWriter {
    /// Commit a streaming head. Fails when the handler stopped waiting.
    fn commit(&mut self) -> Result<(), ClientDisconnected> {
        let Some(head_tx) = self.head_tx.take() else {
            return Ok(());
        };
        let Some(body) = self.body_rx.take() else {
            return Err(ClientDisconnected);
        };

        let head = ResponseHead::Stream {
            headers: std::mem::take(&mut self.headers),
            body,
        };
        head_tx.send(head).map_err(|_| {
            self.body_tx = None;
            ClientDisconnected
        })
    }
}

impl ResponseWriter for ChannelResponseWriter {
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.head_tx.is_some() {
            self.headers.insert(name, value);
        }
    }

    fn headers_sent(&self) -> bool {
        self.head_tx.is_none()
    }

    fn write(&mut self, chunk: Bytes) -> Result<(), ClientDisconnected> {
        self.commit()?;
        match &self.body_tx {
            Some(tx) => tx.send(Ok(chunk)).map_err(|_| ClientDisconnected),
            None => Err(ClientDisconnected),
        }
    }

    fn end(&mut self) {
        if self.commit().is_err() {
            debug!("Response ended after client disconnected");
        }
        self.body_tx = None;
    }

    fn send_error(&mut self, status: StatusCode, body: serde_json::Value) {
        self.body_tx = None;
        self.body_rx = None;
        if let Some(head_tx) = self.head_tx.take() {
            if head_tx.send(ResponseHead::Error { status, body }).is_err() {
                debug!(status = %status, "Error response dropped, client disconnected");
            }
        }
    }

    fn abort(&mut self, reason: &str) {
        // Dropping the head sender without a head surfaces as an internal error
        self.head_tx = None;
        self.body_rx = None;
        if let Some(tx) = self.body_tx.take() {
            let _ = tx.send(Err(io::Error::other(reason.to_string())));
        }
    }
}
