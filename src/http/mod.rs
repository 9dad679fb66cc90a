//! HTTP transport for the MCP endpoint
//!
//! Adapts axum requests to [`crate::mcp::server::McpHandler::handle`].

pub mod handlers;
