//! JSON-RPC 2.0 envelope types and helpers
//!
//! Parses untrusted request values into typed envelopes and renders success and
//! error frames. Also hosts the unsafe-key scan applied to every inbound body.

use rust_mcp_sdk::schema::RpcError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;

pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Keys that reject a body outright, wherever they appear in the tree.
pub const UNSAFE_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Request id as sent by the client. Unlike the MCP schema's integer-only id,
/// any JSON number is echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(serde_json::Number),
    String(String),
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }

    /// A request without an id never receives a response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Validates one element of a request body.
    ///
    /// On failure returns the id to address the `Invalid Request` error to.
    pub fn from_value(value: Value) -> Result<Self, Option<RequestId>> {
        let Value::Object(mut object) = value else {
            return Err(None);
        };

        let id = match object.remove("id") {
            None | Some(Value::Null) => None,
            Some(Value::Number(number)) => Some(RequestId::Number(number)),
            Some(Value::String(text)) => Some(RequestId::String(text)),
            Some(_) => return Err(None),
        };

        let version_ok = object.get("jsonrpc").and_then(Value::as_str) == Some(JSONRPC_VERSION);
        let method = match object.remove("method") {
            Some(Value::String(method)) if version_ok => method,
            _ => return Err(id),
        };

        let params = match object.remove("params") {
            None | Some(Value::Null) => None,
            Some(params) => Some(params),
        };

        Ok(Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method,
            params,
            id,
        })
    }
}

/// Maps a handler failure to its JSON-RPC error: 4xx statuses are the caller's
/// fault (`Invalid params`), everything else is `Internal error`.
pub fn app_error_to_rpc_error(err: &AppError) -> RpcError {
    let code = if err.status().is_client_error() {
        error_codes::INVALID_PARAMS
    } else {
        error_codes::INTERNAL_ERROR
    };

    RpcError {
        code,
        data: err.data().cloned(),
        message: err.message().to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsePayload {
    Result(Value),
    Error(RpcError),
}

/// A success or failure frame; the two are mutually exclusive by construction.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Option<RequestId>,
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

impl JsonRpcResponse {
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            payload: ResponsePayload::Result(result),
        }
    }

    pub fn error(id: Option<RequestId>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            payload: ResponsePayload::Error(error),
        }
    }

    pub fn error_code(id: Option<RequestId>, code: i64, message: &str) -> Self {
        Self::error(
            id,
            RpcError {
                code,
                data: None,
                message: message.to_string(),
            },
        )
    }

    pub fn parse_error(data: Option<Value>) -> Self {
        Self::error(
            None,
            RpcError {
                code: error_codes::PARSE_ERROR,
                data,
                message: "Parse error".to_string(),
            },
        )
    }
}

pub fn contains_unsafe_keys(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(key, item)| UNSAFE_KEYS.contains(&key.as_str()) || contains_unsafe_keys(item)),
        Value::Array(items) => items.iter().any(contains_unsafe_keys),
        _ => false,
    }
}

/// Parses a raw body, treating malformed JSON and unsafe keys alike.
pub fn parse_body(body: &[u8]) -> Result<Value, JsonRpcResponse> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|err| JsonRpcResponse::parse_error(Some(Value::String(err.to_string()))))?;

    if is_empty_body(&payload) || contains_unsafe_keys(&payload) {
        return Err(JsonRpcResponse::parse_error(None));
    }

    Ok(payload)
}

/// `null`, `false`, `0` and `""` carry no request at all.
fn is_empty_body(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}
