//! MCP protocol layer
//!
//! [`McpServer`] collects tools, resources and server metadata during setup.
//! [`McpServer::into_handler`] freezes them into an [`McpHandler`], which owns
//! the method table (handshake, `ping`, tool and resource methods) and exposes a
//! single `handle(request) -> response` entry point any HTTP host can mount.

use std::{future::Future, sync::Arc};

use axum::{
    body::Bytes,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use rust_mcp_sdk::schema::{
    Implementation, ServerCapabilities, ServerCapabilitiesResources, ServerCapabilitiesTools,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{
    callback::BoxError,
    resources::{Resource, ResourceRegistry, ResourceTemplate},
    tools::{ToolDefinition, ToolRegistry},
};
use crate::errors::AppError;
use crate::mcp::{
    context::RequestContext,
    dispatcher::{JsonRpcDispatcher, MethodOutput, MethodTable},
    rpc::JsonRpcRequest,
};

/// Newest first; unknown client versions negotiate to the first entry.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 2] = ["2025-06-18", "2025-03-26"];
pub const LATEST_PROTOCOL_VERSION: &str = SUPPORTED_PROTOCOL_VERSIONS[0];
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

const INVALID_INITIALIZE_PARAMS: &str =
    "Invalid request parameters. 'protocolVersion' and 'clientInfo' are required.";
const INVALID_INITIALIZED_NOTIFICATION: &str =
    "The 'notifications/initialized' method does not accept parameters.";

pub fn negotiate_protocol_version(requested: &str) -> &'static str {
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .copied()
        .find(|version| *version == requested)
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResponse<'a> {
    protocol_version: &'a str,
    capabilities: &'a ServerCapabilities,
    server_info: &'a Implementation,
}

struct Handshake {
    server_info: Implementation,
    capabilities: ServerCapabilities,
}

impl Handshake {
    async fn initialize(
        &self,
        request: JsonRpcRequest,
        ctx: RequestContext,
    ) -> Result<MethodOutput, AppError> {
        let params = request.params.as_ref().and_then(Value::as_object);
        let requested = params
            .and_then(|params| params.get("protocolVersion"))
            .and_then(Value::as_str)
            .filter(|version| !version.is_empty());
        let client_info = params
            .and_then(|params| params.get("clientInfo"))
            .filter(|client_info| client_info.is_object());

        let (Some(requested), Some(client_info)) = (requested, client_info) else {
            return Err(AppError::bad_request(INVALID_INITIALIZE_PARAMS));
        };

        let protocol_version = negotiate_protocol_version(requested);
        let client = client_info
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let session_id = Uuid::new_v4().to_string();
        let header_value = HeaderValue::try_from(session_id.as_str())
            .map_err(|err| AppError::internal(format!("invalid session id header: {err}")))?;
        ctx.set_response_header(HeaderName::from_static(SESSION_ID_HEADER), header_value);

        info!(
            session_id = %session_id,
            client,
            requested_version = requested,
            protocol_version,
            "mcp session initialized"
        );

        let result = serde_json::to_value(InitializeResponse {
            protocol_version,
            capabilities: &self.capabilities,
            server_info: &self.server_info,
        })
        .map_err(|err| {
            AppError::internal(format!("initialize result serialization failed: {err}"))
        })?;

        Ok(result.into())
    }
}

async fn initialized(request: JsonRpcRequest) -> Result<MethodOutput, AppError> {
    if !request.is_notification() || request.params.is_some() {
        return Err(AppError::bad_request(INVALID_INITIALIZED_NOTIFICATION));
    }
    debug!("client reported initialization complete");
    Ok(MethodOutput::Empty)
}

pub struct McpServer {
    server_info: Implementation,
    capabilities: ServerCapabilities,
    tools: ToolRegistry,
    resources: ResourceRegistry,
}

impl McpServer {
    pub fn new(server_info: Implementation, capabilities: ServerCapabilities) -> Self {
        Self {
            server_info,
            capabilities,
            tools: ToolRegistry::new(),
            resources: ResourceRegistry::new(),
        }
    }

    /// Returns true when a tool with the same name was replaced.
    pub fn tool<F, Fut, R>(&mut self, definition: ToolDefinition, handler: F) -> bool
    where
        F: Fn(Value, RequestContext, JsonRpcRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
        R: Into<MethodOutput> + Send + 'static,
    {
        self.tools.register(definition, handler)
    }

    pub fn resource(&mut self, resource: Resource) -> bool {
        self.resources.register(resource)
    }

    pub fn resource_template(&mut self, template: ResourceTemplate) -> bool {
        self.resources.register_template(template)
    }

    /// Registry access for handler-backed resources, overrides and fallbacks.
    pub fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }

    pub fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.resources
    }

    /// Caller-supplied capability entries win; `tools` and `resources` are
    /// filled in only when left unset and something is registered.
    fn merged_capabilities(&self) -> ServerCapabilities {
        let mut capabilities = self.capabilities.clone();
        if capabilities.tools.is_none() && !self.tools.is_empty() {
            capabilities.tools = Some(ServerCapabilitiesTools { list_changed: None });
        }
        if capabilities.resources.is_none() && !self.resources.is_empty() {
            capabilities.resources = Some(ServerCapabilitiesResources {
                list_changed: None,
                subscribe: None,
            });
        }
        capabilities
    }

    pub fn into_handler(self) -> McpHandler {
        let handshake = Arc::new(Handshake {
            capabilities: self.merged_capabilities(),
            server_info: self.server_info,
        });
        let tools = Arc::new(self.tools);
        let resources = Arc::new(self.resources);

        let mut methods = MethodTable::new();
        methods.insert(
            "initialize".to_string(),
            Arc::new(move |request: JsonRpcRequest, ctx: RequestContext| {
                let handshake = Arc::clone(&handshake);
                async move { handshake.initialize(request, ctx).await }
            }),
        );
        methods.insert(
            "notifications/initialized".to_string(),
            Arc::new(|request: JsonRpcRequest, _ctx: RequestContext| initialized(request)),
        );
        methods.insert(
            "ping".to_string(),
            Arc::new(|_request: JsonRpcRequest, _ctx: RequestContext| async move {
                Ok::<_, AppError>(MethodOutput::Value(json!({})))
            }),
        );
        tools.install(&mut methods);
        resources.install(&mut methods);

        McpHandler {
            dispatcher: JsonRpcDispatcher::new(methods),
        }
    }
}

/// Frozen protocol endpoint; share it behind an `Arc`.
pub struct McpHandler {
    dispatcher: JsonRpcDispatcher,
}

impl McpHandler {
    pub async fn handle(&self, request: Request<Bytes>) -> Response {
        let (parts, body) = request.into_parts();
        let ctx = RequestContext::new(parts.method.clone(), parts.headers);

        if parts.method == Method::POST {
            return self.dispatcher.dispatch(&body, &ctx).await;
        }

        if parts.method == Method::DELETE {
            let session_header = HeaderName::from_static(SESSION_ID_HEADER);
            debug!(
                session_id = ?ctx.headers().get(&session_header),
                "mcp session closed"
            );
            ctx.remove_response_header(&session_header);
            return StatusCode::ACCEPTED.into_response();
        }

        AppError::method_not_allowed("Method Not Allowed").into_response()
    }
}
