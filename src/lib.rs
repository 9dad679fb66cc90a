use std::sync::Arc;

use axum::{middleware, routing::any, Router};

pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;

use mcp::server::McpHandler;

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<McpHandler>,
}

impl AppState {
    pub fn new(handler: McpHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }
}

/// Mounts the MCP endpoint at `path`, which must start with `/`.
pub fn build_app(state: AppState, path: &str) -> Router {
    Router::new()
        .route(path, any(http::handlers::mcp_endpoint))
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
