//! Chunked `text/event-stream` delivery for long-running calls
//!
//! A handler returns an [`McpStream`] wrapping a producer routine. Nothing runs
//! until the dispatcher renders the stream; if the client cannot take an event
//! stream the exchange fails with 406 before any bytes exist. When the producer
//! finishes, the optional terminal JSON-RPC frame is appended as the last chunk.

use std::future::Future;

use axum::{
    body::{Body, Bytes},
    http::{header::CONTENT_TYPE, HeaderValue},
    response::{IntoResponse, Response},
};
use futures::{future::BoxFuture, stream, FutureExt};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use crate::domain::callback::BoxError;
use crate::errors::AppError;
use crate::mcp::context::{RequestContext, EVENT_STREAM_MIME};
use crate::mcp::rpc::JsonRpcResponse;

const CHANNEL_CAPACITY: usize = 16;

type Chunk = Result<Bytes, BoxError>;
type Producer = Box<dyn FnOnce(StreamWriter) -> BoxFuture<'static, Result<(), BoxError>> + Send>;

#[derive(Debug, Error)]
#[error("stream receiver closed")]
pub struct StreamClosed;

/// Push side of an [`McpStream`].
#[derive(Debug, Clone)]
pub struct StreamWriter {
    tx: mpsc::Sender<Chunk>,
}

impl StreamWriter {
    pub async fn send(&self, chunk: impl Into<Bytes>) -> Result<(), StreamClosed> {
        self.tx
            .send(Ok(chunk.into()))
            .await
            .map_err(|_| StreamClosed)
    }

    pub async fn send_json<T: Serialize>(&self, value: &T) -> Result<(), BoxError> {
        let encoded = serde_json::to_vec(value)?;
        self.send(encoded).await?;
        Ok(())
    }
}

pub struct McpStream {
    producer: Producer,
    final_response: Option<JsonRpcResponse>,
}

impl std::fmt::Debug for McpStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpStream")
            .field("final_response", &self.final_response)
            .finish_non_exhaustive()
    }
}

impl McpStream {
    pub fn new<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(StreamWriter) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            producer: Box::new(move |writer| producer(writer).boxed()),
            final_response: None,
        }
    }

    /// Frame serialized after the producer completes.
    pub fn with_final_response(mut self, response: JsonRpcResponse) -> Self {
        self.final_response = Some(response);
        self
    }

    /// Starts the producer and renders the streaming response.
    pub fn into_http_response(self, ctx: &RequestContext) -> Response {
        if !ctx.accepts_event_stream() {
            return AppError::not_acceptable("Not Acceptable").into_response();
        }

        let (tx, rx) = mpsc::channel::<Chunk>(CHANNEL_CAPACITY);
        let writer = StreamWriter { tx: tx.clone() };
        let Self {
            producer,
            final_response,
        } = self;

        tokio::spawn(async move {
            if let Err(err) = producer(writer).await {
                warn!(error = %err, "stream producer failed");
                let _ = tx.send(Err(err)).await;
                return;
            }

            if let Some(response) = final_response {
                let frame = serde_json::to_vec(&response)
                    .map(Bytes::from)
                    .map_err(BoxError::from);
                let _ = tx.send(frame).await;
            }
        });

        let chunks = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        });

        let mut response = Body::from_stream(chunks).into_response();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(EVENT_STREAM_MIME));
        response
    }
}
