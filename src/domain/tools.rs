//! Tool registry behind `tools/list` and `tools/call`
//!
//! Tools are registered during setup, each pairing a definition with one
//! handler. Arguments pass through the tool's validator before the handler
//! sees them; names with no registration can be served by an external fallback.

use std::{future::Future, sync::Arc};

use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::domain::{
    callback::{BoxError, Callback, Fallback},
    registry::Registry,
    schema::InputSchema,
    utils::{cursor, params_object, required_string},
};
use crate::errors::AppError;
use crate::mcp::{
    context::RequestContext,
    dispatcher::{MethodOutput, MethodTable},
    rpc::JsonRpcRequest,
};

const INVALID_CALL_PARAMS: &str =
    "Invalid parameters for \"tools/call\". It must be an object with a \"name\" property.";

pub type ToolHandler = dyn Callback<Value, MethodOutput>;
pub type ToolListHandler = dyn Callback<ToolList, Option<Value>>;
pub type ToolCallFallback = dyn Callback<ToolCallParams, Fallback<Value>>;

#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub schema: Option<Arc<dyn InputSchema>>,
    /// Advertised as-is instead of deriving from `schema`.
    pub json_schema: Option<Value>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            schema: None,
            json_schema: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_schema(mut self, schema: impl InputSchema + 'static) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    pub fn with_json_schema(mut self, json_schema: Value) -> Self {
        self.json_schema = Some(json_schema);
        self
    }

    async fn listing(&self) -> ToolListing {
        let input_schema = match (&self.json_schema, &self.schema) {
            (Some(json_schema), _) => Some(json_schema.clone()),
            (None, Some(schema)) => match schema.json_schema().await {
                Ok(json_schema) => Some(json_schema),
                Err(err) => {
                    warn!(tool = %self.name, error = %err, "failed to convert tool input schema");
                    None
                }
            },
            (None, None) => None,
        };

        ToolListing {
            name: self.name.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            input_schema,
        }
    }
}

/// One entry of a `tools/list` result. Kept local since the MCP schema's
/// `Tool` requires `inputSchema`, which is omitted when conversion fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolListing {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// Input of a `tools/list` override.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolList {
    pub cursor: Option<String>,
    pub tools: Vec<ToolListing>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallParams {
    pub name: String,
    pub arguments: Option<Value>,
}

struct ToolEntry {
    definition: ToolDefinition,
    handler: Arc<ToolHandler>,
}

pub struct ToolRegistry {
    tools: Registry<ToolEntry>,
    list_override: Option<Arc<ToolListHandler>>,
    call_fallback: Option<Arc<ToolCallFallback>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Registry::new("tool"),
            list_override: None,
            call_fallback: None,
        }
    }

    /// Returns true when a tool with the same name was replaced.
    pub fn register<F, Fut, R>(&mut self, definition: ToolDefinition, handler: F) -> bool
    where
        F: Fn(Value, RequestContext, JsonRpcRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
        R: Into<MethodOutput> + Send + 'static,
    {
        let handler = move |input: Value, ctx: RequestContext, request: JsonRpcRequest| {
            let pending = handler(input, ctx, request);
            async move {
                pending
                    .await
                    .map(|output| Into::<MethodOutput>::into(output))
            }
        };

        let name = definition.name.clone();
        self.tools.insert(
            name,
            ToolEntry {
                definition,
                handler: Arc::new(handler),
            },
        )
    }

    pub fn on_list<F, Fut>(&mut self, handler: F)
    where
        F: Fn(ToolList, RequestContext, JsonRpcRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>, BoxError>> + Send + 'static,
    {
        self.list_override = Some(Arc::new(handler));
    }

    pub fn on_call<F, Fut>(&mut self, handler: F)
    where
        F: Fn(ToolCallParams, RequestContext, JsonRpcRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Fallback<Value>, BoxError>> + Send + 'static,
    {
        self.call_fallback = Some(Arc::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|entry| &entry.definition)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn install(self: &Arc<Self>, table: &mut MethodTable) {
        let tools = Arc::clone(self);
        table.insert(
            "tools/list".to_string(),
            Arc::new(move |request: JsonRpcRequest, ctx: RequestContext| {
                let tools = Arc::clone(&tools);
                async move { tools.list(request, ctx).await }
            }),
        );

        let tools = Arc::clone(self);
        table.insert(
            "tools/call".to_string(),
            Arc::new(move |request: JsonRpcRequest, ctx: RequestContext| {
                let tools = Arc::clone(&tools);
                async move { tools.call(request, ctx).await }
            }),
        );
    }

    pub async fn list(
        &self,
        request: JsonRpcRequest,
        ctx: RequestContext,
    ) -> Result<MethodOutput, AppError> {
        let tools = join_all(self.tools.values().map(|entry| entry.definition.listing())).await;

        let Some(list_override) = &self.list_override else {
            return Ok(json!({ "tools": tools }).into());
        };

        let listing = ToolList {
            cursor: cursor(request.params.as_ref()),
            tools,
        };
        let result = list_override
            .invoke(listing, ctx, request)
            .await
            .map_err(|err| {
                AppError::internal_with_data("Error listing tools.", json!(err.to_string()))
            })?;

        Ok(result.map_or(MethodOutput::Empty, MethodOutput::Value))
    }

    pub async fn call(
        &self,
        request: JsonRpcRequest,
        ctx: RequestContext,
    ) -> Result<MethodOutput, AppError> {
        let params = params_object(request.params.as_ref(), INVALID_CALL_PARAMS)?;
        let name = required_string(params, "name", INVALID_CALL_PARAMS)?;
        let arguments = params.get("arguments").cloned();

        let Some(entry) = self.tools.get(&name) else {
            return self
                .call_fallback(ToolCallParams { name, arguments }, ctx, request)
                .await;
        };

        let arguments = arguments.unwrap_or(Value::Null);
        let input = match &entry.definition.schema {
            Some(schema) => schema.validate(arguments).await.map_err(|issues| {
                AppError::bad_request_with_data(
                    format!("Invalid arguments for tool \"{name}\"."),
                    json!(issues),
                )
            })?,
            None => arguments,
        };

        entry
            .handler
            .invoke(input, ctx, request)
            .await
            .map_err(|err| execution_error(&name, err))
    }

    async fn call_fallback(
        &self,
        params: ToolCallParams,
        ctx: RequestContext,
        request: JsonRpcRequest,
    ) -> Result<MethodOutput, AppError> {
        let name = params.name.clone();

        if let Some(fallback) = &self.call_fallback {
            let is_call = !request.is_notification();
            let outcome = fallback
                .invoke(params, ctx, request)
                .await
                .map_err(|err| execution_error(&name, err))?;

            if let (Fallback::Handled(result), true) = (outcome, is_call) {
                return Ok(MethodOutput::Value(result));
            }
        }

        Err(AppError::not_found(format!("Tool \"{name}\" not found.")))
    }
}

fn execution_error(name: &str, err: BoxError) -> AppError {
    AppError::internal_with_data(
        format!("Error executing tool \"{name}\"."),
        Value::String(err.to_string()),
    )
}
