//! Resource registry behind `resources/list`, `resources/read` and
//! `resources/templates/list`

use std::{future::Future, sync::Arc};

use chrono::{DateTime, SecondsFormat, Utc};
use rust_mcp_sdk::schema::Annotations;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::domain::{
    callback::{BoxError, Callback, Fallback},
    registry::Registry,
    utils::cursor,
};
use crate::errors::AppError;
use crate::mcp::{
    context::RequestContext,
    dispatcher::{MethodOutput, MethodTable},
    rpc::JsonRpcRequest,
};

const INVALID_READ_PARAMS: &str = "Missing or invalid \"uri\" parameter for resources/read.";

/// Inline payload of a resource; text and blob are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceContent {
    Text(String),
    /// Base64-encoded bytes.
    Blob(String),
}

/// A registered resource. Unlike the MCP schema type, `name` is optional and the
/// text or blob payload lives inline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    #[serde(flatten)]
    pub content: Option<ResourceContent>,
}

impl Resource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
            title: None,
            description: None,
            mime_type: None,
            annotations: None,
            content: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Sets `annotations.lastModified` as an RFC 3339 UTC timestamp.
    pub fn with_last_modified(mut self, modified_at: DateTime<Utc>) -> Self {
        let annotations = self.annotations.get_or_insert_with(Annotations::default);
        annotations.last_modified = Some(modified_at.to_rfc3339_opts(SecondsFormat::Secs, true));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content = Some(ResourceContent::Text(text.into()));
        self
    }

    pub fn with_blob(mut self, blob: impl Into<String>) -> Self {
        self.content = Some(ResourceContent::Blob(blob.into()));
        self
    }

    fn metadata(&self) -> Self {
        Self {
            content: None,
            ..self.clone()
        }
    }
}

/// Partial resource returned by a read handler, merged over the registered one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceOverride {
    pub content: Option<ResourceContent>,
    /// Extra fields; these win over the registered metadata on key clashes.
    pub extra: Map<String, Value>,
}

impl ResourceOverride {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: Some(ResourceContent::Text(text.into())),
            extra: Map::new(),
        }
    }

    pub fn blob(blob: impl Into<String>) -> Self {
        Self {
            content: Some(ResourceContent::Blob(blob.into())),
            extra: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    fn merge_into(self, resource: &Resource) -> Value {
        let mut merged = match json!(resource) {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        if let Some(content) = self.content {
            merged.remove("text");
            merged.remove("blob");
            if let Value::Object(content) = json!(content) {
                merged.extend(content);
            }
        }
        merged.extend(self.extra);
        Value::Object(merged)
    }
}

/// Static URI template; `name` is optional here, unlike the MCP schema type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    pub uri_template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ResourceTemplate {
    pub fn new(uri_template: impl Into<String>) -> Self {
        Self {
            uri_template: uri_template.into(),
            name: None,
            title: None,
            description: None,
            mime_type: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// What a read fallback found: one resource or several.
#[derive(Debug, Clone)]
pub enum ResourceContents {
    One(Resource),
    Many(Vec<Resource>),
}

impl ResourceContents {
    pub fn into_vec(self) -> Vec<Resource> {
        match self {
            Self::One(resource) => vec![resource],
            Self::Many(resources) => resources,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceList {
    pub cursor: Option<String>,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceTemplateList {
    pub cursor: Option<String>,
    pub resource_templates: Vec<ResourceTemplate>,
}

pub type ResourceHandler = dyn Callback<String, ResourceOverride>;
pub type ResourceListHandler = dyn Callback<ResourceList, Option<Value>>;
pub type ResourceTemplateListHandler = dyn Callback<ResourceTemplateList, Option<Value>>;
pub type ResourceReadFallback = dyn Callback<String, Fallback<ResourceContents>>;

struct ResourceEntry {
    resource: Resource,
    handler: Option<Arc<ResourceHandler>>,
}

pub struct ResourceRegistry {
    resources: Registry<ResourceEntry>,
    templates: Registry<ResourceTemplate>,
    list_override: Option<Arc<ResourceListHandler>>,
    templates_override: Option<Arc<ResourceTemplateListHandler>>,
    read_fallback: Option<Arc<ResourceReadFallback>>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            resources: Registry::new("resource"),
            templates: Registry::new("resource template"),
            list_override: None,
            templates_override: None,
            read_fallback: None,
        }
    }

    /// Registers a static resource served as-is. Returns true on overwrite.
    pub fn register(&mut self, resource: Resource) -> bool {
        let uri = resource.uri.clone();
        self.resources.insert(
            uri,
            ResourceEntry {
                resource,
                handler: None,
            },
        )
    }

    /// Registers a resource whose read result is merged with `handler`'s output.
    pub fn register_with_handler<F, Fut>(&mut self, resource: Resource, handler: F) -> bool
    where
        F: Fn(String, RequestContext, JsonRpcRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ResourceOverride, BoxError>> + Send + 'static,
    {
        let uri = resource.uri.clone();
        self.resources.insert(
            uri,
            ResourceEntry {
                resource,
                handler: Some(Arc::new(handler)),
            },
        )
    }

    pub fn register_template(&mut self, template: ResourceTemplate) -> bool {
        let key = template.uri_template.clone();
        self.templates.insert(key, template)
    }

    pub fn on_list<F, Fut>(&mut self, handler: F)
    where
        F: Fn(ResourceList, RequestContext, JsonRpcRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>, BoxError>> + Send + 'static,
    {
        self.list_override = Some(Arc::new(handler));
    }

    pub fn on_templates_list<F, Fut>(&mut self, handler: F)
    where
        F: Fn(ResourceTemplateList, RequestContext, JsonRpcRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>, BoxError>> + Send + 'static,
    {
        self.templates_override = Some(Arc::new(handler));
    }

    pub fn on_read<F, Fut>(&mut self, handler: F)
    where
        F: Fn(String, RequestContext, JsonRpcRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Fallback<ResourceContents>, BoxError>> + Send + 'static,
    {
        self.read_fallback = Some(Arc::new(handler));
    }

    pub fn get(&self, uri: &str) -> Option<&Resource> {
        self.resources.get(uri).map(|entry| &entry.resource)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn install(self: &Arc<Self>, table: &mut MethodTable) {
        let resources = Arc::clone(self);
        table.insert(
            "resources/list".to_string(),
            Arc::new(move |request: JsonRpcRequest, ctx: RequestContext| {
                let resources = Arc::clone(&resources);
                async move { resources.list(request, ctx).await }
            }),
        );

        let resources = Arc::clone(self);
        table.insert(
            "resources/read".to_string(),
            Arc::new(move |request: JsonRpcRequest, ctx: RequestContext| {
                let resources = Arc::clone(&resources);
                async move { resources.read(request, ctx).await }
            }),
        );

        let resources = Arc::clone(self);
        table.insert(
            "resources/templates/list".to_string(),
            Arc::new(move |request: JsonRpcRequest, ctx: RequestContext| {
                let resources = Arc::clone(&resources);
                async move { resources.list_templates(request, ctx).await }
            }),
        );
    }

    pub async fn list(
        &self,
        request: JsonRpcRequest,
        ctx: RequestContext,
    ) -> Result<MethodOutput, AppError> {
        let resources: Vec<Resource> = self
            .resources
            .values()
            .map(|entry| entry.resource.metadata())
            .collect();

        let Some(list_override) = &self.list_override else {
            return Ok(json!({ "resources": resources }).into());
        };

        let listing = ResourceList {
            cursor: cursor(request.params.as_ref()),
            resources,
        };
        let result = list_override
            .invoke(listing, ctx, request)
            .await
            .map_err(|err| listing_error("resources", err))?;

        Ok(result.map_or(MethodOutput::Empty, MethodOutput::Value))
    }

    pub async fn list_templates(
        &self,
        request: JsonRpcRequest,
        ctx: RequestContext,
    ) -> Result<MethodOutput, AppError> {
        let resource_templates: Vec<ResourceTemplate> = self.templates.values().cloned().collect();

        let Some(templates_override) = &self.templates_override else {
            return Ok(json!({ "resourceTemplates": resource_templates }).into());
        };

        let listing = ResourceTemplateList {
            cursor: cursor(request.params.as_ref()),
            resource_templates,
        };
        let result = templates_override
            .invoke(listing, ctx, request)
            .await
            .map_err(|err| listing_error("resource templates", err))?;

        Ok(result.map_or(MethodOutput::Empty, MethodOutput::Value))
    }

    pub async fn read(
        &self,
        request: JsonRpcRequest,
        ctx: RequestContext,
    ) -> Result<MethodOutput, AppError> {
        let uri = request
            .params
            .as_ref()
            .and_then(|params| params.get("uri"))
            .and_then(Value::as_str)
            .filter(|uri| !uri.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request(INVALID_READ_PARAMS))?;

        let Some(entry) = self.resources.get(&uri) else {
            return self.read_fallback(uri, ctx, request).await;
        };

        let contents = match &entry.handler {
            Some(handler) => handler
                .invoke(uri.clone(), ctx, request)
                .await
                .map_err(|err| read_error(&uri, err))?
                .merge_into(&entry.resource),
            None => json!(entry.resource),
        };

        Ok(json!({ "contents": [contents] }).into())
    }

    async fn read_fallback(
        &self,
        uri: String,
        ctx: RequestContext,
        request: JsonRpcRequest,
    ) -> Result<MethodOutput, AppError> {
        if let Some(fallback) = &self.read_fallback {
            let outcome = fallback
                .invoke(uri.clone(), ctx, request)
                .await
                .map_err(|err| read_error(&uri, err))?;

            if let Fallback::Handled(contents) = outcome {
                return Ok(json!({ "contents": contents.into_vec() }).into());
            }
        }

        Err(AppError::not_found(format!("Resource \"{uri}\" not found.")))
    }
}

fn listing_error(kind: &str, err: BoxError) -> AppError {
    AppError::internal_with_data(format!("Error listing {kind}."), Value::String(err.to_string()))
}

fn read_error(uri: &str, err: BoxError) -> AppError {
    AppError::internal_with_data(
        format!("Error reading resource \"{uri}\"."),
        Value::String(err.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::rpc::RequestId;
    use axum::http::{HeaderMap, Method, StatusCode};
    use chrono::TimeZone;
    use rust_mcp_sdk::schema::Role;

    fn ctx() -> RequestContext {
        RequestContext::new(Method::POST, HeaderMap::new())
    }

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest::new(method, Some(params), Some(RequestId::from(7)))
    }

    fn value(output: MethodOutput) -> Value {
        match output {
            MethodOutput::Value(value) => value,
            other => panic!("expected a value, got {other:?}"),
        }
    }

    fn greeting_registry() -> ResourceRegistry {
        let mut registry = ResourceRegistry::new();
        registry.register(
            Resource::new("memo://greeting")
                .with_name("greeting")
                .with_mime_type("text/plain")
                .with_text("X"),
        );
        registry
    }

    #[tokio::test]
    async fn static_text_round_trips() {
        let registry = greeting_registry();
        let result = value(
            registry
                .read(request("resources/read", json!({"uri": "memo://greeting"})), ctx())
                .await
                .expect("read"),
        );

        assert_eq!(
            result,
            json!({"contents": [{
                "uri": "memo://greeting",
                "name": "greeting",
                "mimeType": "text/plain",
                "text": "X"
            }]})
        );
    }

    #[tokio::test]
    async fn listing_strips_payload_and_is_idempotent() {
        let mut registry = greeting_registry();
        registry.register(
            Resource::new("memo://report")
                .with_annotations(Annotations {
                    audience: vec![Role::User, Role::Assistant],
                    priority: Some(0.5),
                    ..Annotations::default()
                })
                .with_last_modified(
                    Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5)
                        .single()
                        .expect("valid timestamp"),
                )
                .with_blob("AAEC"),
        );

        let first = value(
            registry
                .list(request("resources/list", json!({})), ctx())
                .await
                .expect("list"),
        );
        let second = value(
            registry
                .list(request("resources/list", json!({})), ctx())
                .await
                .expect("list"),
        );
        assert_eq!(first, second);

        let listed = first["resources"].as_array().expect("resources array");
        assert_eq!(listed.len(), 2);
        assert!(listed
            .iter()
            .all(|entry| entry.get("text").is_none() && entry.get("blob").is_none()));
        assert_eq!(listed[1]["annotations"]["audience"], json!(["user", "assistant"]));
        assert_eq!(listed[1]["annotations"]["lastModified"], "2025-01-02T03:04:05Z");
    }

    #[tokio::test]
    async fn handler_output_replaces_payload_and_adds_fields() {
        let mut registry = ResourceRegistry::new();
        registry.register_with_handler(
            Resource::new("memo://clock").with_name("clock").with_text("stale"),
            |uri: String, _ctx: RequestContext, _request: JsonRpcRequest| async move {
                Ok::<_, BoxError>(
                    ResourceOverride::blob("AQID")
                        .with_field("name", json!("clock (live)"))
                        .with_field("requested", json!(uri)),
                )
            },
        );

        let result = value(
            registry
                .read(request("resources/read", json!({"uri": "memo://clock"})), ctx())
                .await
                .expect("read"),
        );
        let entry = &result["contents"][0];
        assert_eq!(entry["blob"], "AQID");
        assert!(entry.get("text").is_none());
        assert_eq!(entry["name"], "clock (live)");
        assert_eq!(entry["requested"], "memo://clock");
    }

    #[tokio::test]
    async fn missing_or_empty_uri_is_bad_request() {
        let registry = greeting_registry();
        for params in [json!({}), json!({"uri": ""}), json!({"uri": 5})] {
            let error = registry
                .read(request("resources/read", params), ctx())
                .await
                .expect_err("invalid uri");
            assert_eq!(error.status(), StatusCode::BAD_REQUEST);
            assert_eq!(error.message(), INVALID_READ_PARAMS);
        }
    }

    #[tokio::test]
    async fn unknown_resource_is_not_found_without_fallback() {
        let registry = greeting_registry();
        let error = registry
            .read(request("resources/read", json!({"uri": "memo://nope"})), ctx())
            .await
            .expect_err("unknown");
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert_eq!(error.message(), "Resource \"memo://nope\" not found.");
    }

    #[tokio::test]
    async fn fallback_results_are_normalized_to_arrays() {
        let mut registry = greeting_registry();
        registry.on_read(
            |uri: String, _ctx: RequestContext, _request: JsonRpcRequest| async move {
                let found = match uri.as_str() {
                    "dyn://one" => Some(ResourceContents::One(
                        Resource::new(uri.clone()).with_text("one"),
                    )),
                    "dyn://many" => Some(ResourceContents::Many(vec![
                        Resource::new("dyn://many/a").with_text("a"),
                        Resource::new("dyn://many/b").with_text("b"),
                    ])),
                    _ => None,
                };
                Ok::<Fallback<ResourceContents>, BoxError>(found.into())
            },
        );

        let one = value(
            registry
                .read(request("resources/read", json!({"uri": "dyn://one"})), ctx())
                .await
                .expect("one"),
        );
        assert_eq!(one["contents"], json!([{"uri": "dyn://one", "text": "one"}]));

        let many = value(
            registry
                .read(request("resources/read", json!({"uri": "dyn://many"})), ctx())
                .await
                .expect("many"),
        );
        assert_eq!(many["contents"].as_array().map(Vec::len), Some(2));

        let error = registry
            .read(request("resources/read", json!({"uri": "dyn://none"})), ctx())
            .await
            .expect_err("declined");
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn templates_listing_and_override() {
        let mut registry = ResourceRegistry::new();
        registry.register_template(
            ResourceTemplate::new("memo://notes/{id}")
                .with_name("note")
                .with_mime_type("text/plain"),
        );

        let listed = value(
            registry
                .list_templates(request("resources/templates/list", json!({})), ctx())
                .await
                .expect("templates"),
        );
        assert_eq!(
            listed,
            json!({"resourceTemplates": [{
                "uriTemplate": "memo://notes/{id}",
                "name": "note",
                "mimeType": "text/plain"
            }]})
        );

        registry.on_templates_list(
            |listing: ResourceTemplateList, _ctx: RequestContext, _request: JsonRpcRequest| {
                async move {
                    Ok::<_, BoxError>(Some(json!({
                        "resourceTemplates": listing.resource_templates.len(),
                        "nextCursor": listing.cursor,
                    })))
                }
            },
        );
        let overridden = value(
            registry
                .list_templates(request("resources/templates/list", json!({"cursor": "c1"})), ctx())
                .await
                .expect("override"),
        );
        assert_eq!(overridden, json!({"resourceTemplates": 1, "nextCursor": "c1"}));
    }

    #[tokio::test]
    async fn list_override_receives_metadata_only() {
        let mut registry = greeting_registry();
        registry.on_list(
            |listing: ResourceList, _ctx: RequestContext, _request: JsonRpcRequest| async move {
                let payloads = listing
                    .resources
                    .iter()
                    .filter(|resource| resource.content.is_some())
                    .count();
                Ok::<_, BoxError>(Some(json!({ "payloads": payloads, "cursor": listing.cursor })))
            },
        );

        let result = value(
            registry
                .list(request("resources/list", json!({"cursor": "p"})), ctx())
                .await
                .expect("list"),
        );
        assert_eq!(result, json!({"payloads": 0, "cursor": "p"}));
    }

    #[test]
    fn reregistration_overwrites_and_reports() {
        let mut registry = greeting_registry();
        assert!(registry.register(Resource::new("memo://greeting").with_text("Y")));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("memo://greeting").and_then(|resource| resource.content.clone()),
            Some(ResourceContent::Text("Y".to_string()))
        );
        assert!(!registry.register_template(ResourceTemplate::new("a/{b}")));
        assert!(registry.register_template(ResourceTemplate::new("a/{b}")));
    }
}
