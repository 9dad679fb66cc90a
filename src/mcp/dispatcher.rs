//! JSON-RPC 2.0 request dispatch
//!
//! Turns a raw POST body into a single response, a batch response, or an empty
//! 202. Every per-call failure is folded into a JSON-RPC error entry here;
//! notifications never produce an entry, whatever their outcome.

use std::{collections::HashMap, future::Future, sync::Arc, time::Instant};

use axum::{
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::{
    future::{join_all, BoxFuture},
    FutureExt,
};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::errors::AppError;
use crate::mcp::{
    context::RequestContext,
    rpc::{
        app_error_to_rpc_error, error_codes, parse_body, JsonRpcRequest, JsonRpcResponse, RequestId,
    },
    stream::McpStream,
};

/// What a method produced for one call.
#[derive(Debug)]
pub enum MethodOutput {
    Value(Value),
    Stream(McpStream),
    /// Completed without a result value; a call still gets `result: null`.
    Empty,
}

impl From<Value> for MethodOutput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<McpStream> for MethodOutput {
    fn from(stream: McpStream) -> Self {
        Self::Stream(stream)
    }
}

pub trait RpcMethod: Send + Sync {
    fn call(
        &self,
        request: JsonRpcRequest,
        ctx: RequestContext,
    ) -> BoxFuture<'static, Result<MethodOutput, AppError>>;
}

impl<F, Fut> RpcMethod for F
where
    F: Fn(JsonRpcRequest, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<MethodOutput, AppError>> + Send + 'static,
{
    fn call(
        &self,
        request: JsonRpcRequest,
        ctx: RequestContext,
    ) -> BoxFuture<'static, Result<MethodOutput, AppError>> {
        (self)(request, ctx).boxed()
    }
}

pub type MethodTable = HashMap<String, Arc<dyn RpcMethod>>;

/// Result of processing one element of the body.
enum Processed {
    Frame(JsonRpcResponse),
    Stream {
        id: Option<RequestId>,
        stream: McpStream,
    },
}

pub struct JsonRpcDispatcher {
    methods: MethodTable,
}

impl JsonRpcDispatcher {
    pub fn new(methods: MethodTable) -> Self {
        Self { methods }
    }

    pub async fn dispatch(&self, body: &[u8], ctx: &RequestContext) -> Response {
        if ctx.method() != Method::POST {
            return AppError::method_not_allowed("Method Not Allowed").into_response();
        }

        let payload = match parse_body(body) {
            Ok(payload) => payload,
            Err(parse_error) => {
                return finish(ctx, StatusCode::OK, Some(Json(parse_error).into_response()))
            }
        };

        match payload {
            Value::Array(items) => {
                let processed =
                    join_all(items.into_iter().map(|item| self.process(item, ctx.clone()))).await;

                let frames: Vec<JsonRpcResponse> = processed
                    .into_iter()
                    .flatten()
                    .map(|entry| match entry {
                        Processed::Frame(frame) => frame,
                        Processed::Stream { id, .. } => JsonRpcResponse::error_code(
                            id,
                            error_codes::INTERNAL_ERROR,
                            "Streaming results cannot be returned inside a batch",
                        ),
                    })
                    .collect();

                if frames.is_empty() {
                    return finish(ctx, StatusCode::ACCEPTED, None);
                }
                finish(ctx, StatusCode::OK, Some(Json(frames).into_response()))
            }
            single => match self.process(single, ctx.clone()).await {
                None => finish(ctx, StatusCode::ACCEPTED, None),
                Some(Processed::Frame(frame)) => {
                    finish(ctx, StatusCode::OK, Some(Json(frame).into_response()))
                }
                Some(Processed::Stream { stream, .. }) => {
                    let response = stream.into_http_response(ctx);
                    let status = response.status();
                    finish(ctx, status, Some(response))
                }
            },
        }
    }

    async fn process(&self, item: Value, ctx: RequestContext) -> Option<Processed> {
        let request = match JsonRpcRequest::from_value(item) {
            Ok(request) => request,
            Err(id) => {
                return Some(Processed::Frame(JsonRpcResponse::error_code(
                    id,
                    error_codes::INVALID_REQUEST,
                    "Invalid Request",
                )))
            }
        };

        let Some(method) = self.methods.get(&request.method) else {
            if request.is_notification() {
                debug!(method = %request.method, "dropping notification for unknown method");
                return None;
            }
            return Some(Processed::Frame(JsonRpcResponse::error_code(
                request.id,
                error_codes::METHOD_NOT_FOUND,
                "Method not found",
            )));
        };

        let id = request.id.clone();
        let method_name = request.method.clone();
        let started_at = Instant::now();
        let outcome = method.call(request, ctx).await;

        debug!(
            method = %method_name,
            outcome = if outcome.is_ok() { "success" } else { "failure" },
            duration_ms = started_at.elapsed().as_millis(),
            "json-rpc method dispatched"
        );

        if id.is_none() {
            if let Err(err) = outcome {
                warn!(method = %method_name, error = %err, "notification handler failed");
            }
            return None;
        }

        match outcome {
            Ok(MethodOutput::Value(result)) => {
                Some(Processed::Frame(JsonRpcResponse::success(id, result)))
            }
            Ok(MethodOutput::Stream(stream)) => Some(Processed::Stream { id, stream }),
            Ok(MethodOutput::Empty) => {
                Some(Processed::Frame(JsonRpcResponse::success(id, Value::Null)))
            }
            Err(err) => {
                if err.status().is_server_error() {
                    error!(method = %method_name, error = %err, "json-rpc method failed");
                }
                Some(Processed::Frame(JsonRpcResponse::error(
                    id,
                    app_error_to_rpc_error(&err),
                )))
            }
        }
    }
}

/// Applies status and the headers handlers asked for.
fn finish(ctx: &RequestContext, status: StatusCode, body: Option<Response>) -> Response {
    let mut response = body.unwrap_or_else(|| ().into_response());
    *response.status_mut() = status;
    merge_headers(response.headers_mut(), ctx.response_headers());
    response
}

fn merge_headers(target: &mut HeaderMap, extra: HeaderMap) {
    for (name, value) in extra.iter() {
        target.insert(name.clone(), value.clone());
    }
}
