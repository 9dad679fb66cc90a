use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Error type shared by handlers and transport code.
///
/// Every variant carries an HTTP-style status. The dispatcher folds 4xx
/// statuses into `Invalid params` and everything else into `Internal error`;
/// only transport violations are ever rendered as raw HTTP failures.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest {
        message: String,
        data: Option<Value>,
    },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("method not allowed: {message}")]
    MethodNotAllowed { message: String },
    #[error("not acceptable: {message}")]
    NotAcceptable { message: String },
    #[error("internal error: {message}")]
    Internal {
        message: String,
        data: Option<Value>,
    },
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: Value,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            data: None,
        }
    }

    pub fn bad_request_with_data(message: impl Into<String>, data: Value) -> Self {
        Self::BadRequest {
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::MethodNotAllowed {
            message: message.into(),
        }
    }

    pub fn not_acceptable(message: impl Into<String>) -> Self {
        Self::NotAcceptable {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            data: None,
        }
    }

    pub fn internal_with_data(message: impl Into<String>, data: Value) -> Self {
        Self::Internal {
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message }
            | Self::MethodNotAllowed { message }
            | Self::NotAcceptable { message }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::BadRequest { data, .. } | Self::Internal { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "bad_request",
            Self::NotFound { .. } => "not_found",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
            Self::NotAcceptable { .. } => "not_acceptable",
            Self::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal { message, .. } => {
                tracing::error!(error = %message, "request failed with internal error");
                "internal server error".to_string()
            }
            other => other.message().to_string(),
        };

        (
            status,
            Json(ErrorResponse {
                code: self.code().to_string(),
                message,
                details: json!({}),
            }),
        )
            .into_response()
    }
}
