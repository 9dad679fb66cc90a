//! Model Context Protocol over JSON-RPC 2.0
//!
//! Envelope types, dispatch, the handshake layer and streamed responses.

pub mod context;
pub mod dispatcher;
pub mod rpc;
pub mod server;
pub mod stream;
