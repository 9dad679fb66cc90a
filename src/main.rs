use chrono::Utc;
use mcp_rpc_host::{
    build_app,
    config::Config,
    domain::{
        callback::BoxError,
        resources::{Resource, ResourceOverride, ResourceTemplate},
        schema::TypedSchema,
        tools::ToolDefinition,
    },
    logging,
    mcp::{context::RequestContext, rpc::JsonRpcRequest, server::McpServer},
    AppState,
};
use rust_mcp_sdk::schema::{Annotations, Implementation, Role, ServerCapabilities};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct EchoInput {
    input: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct AddInput {
    a: f64,
    b: f64,
}

fn playground() -> McpServer {
    let mut server = McpServer::new(
        Implementation {
            name: "My MCP Server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
            description: Some("A sample MCP server using axum".to_string()),
            icons: vec![],
            website_url: None,
        },
        ServerCapabilities::default(),
    );

    server.tool(
        ToolDefinition::new("test")
            .with_description("An example tool that echoes back the input")
            .with_schema(TypedSchema::<EchoInput>::new()),
        |input: Value, _ctx: RequestContext, _request: JsonRpcRequest| async move {
            let EchoInput { input } = serde_json::from_value(input)?;
            Ok::<_, BoxError>(json!({ "output": format!("You said: {input}") }))
        },
    );

    server.tool(
        ToolDefinition::new("add")
            .with_description("Adds two numbers together")
            .with_schema(TypedSchema::<AddInput>::new()),
        |input: Value, _ctx: RequestContext, _request: JsonRpcRequest| async move {
            let AddInput { a, b } = serde_json::from_value(input)?;
            Ok::<_, BoxError>(json!({ "output": a + b }))
        },
    );

    server.resources_mut().register_with_handler(
        Resource::new("memo://greeting")
            .with_name("greeting")
            .with_description("A greeting rendered at read time")
            .with_mime_type("text/plain")
            .with_annotations(Annotations {
                audience: vec![Role::User],
                priority: Some(0.5),
                ..Annotations::default()
            })
            .with_last_modified(Utc::now()),
        |_uri: String, _ctx: RequestContext, _request: JsonRpcRequest| async move {
            let greeting = format!("Hello! The time is {}.", Utc::now().to_rfc3339());
            Ok::<_, BoxError>(ResourceOverride::text(greeting))
        },
    );

    server.resource_template(
        ResourceTemplate::new("memo://notes/{id}")
            .with_name("note")
            .with_description("A note by identifier")
            .with_mime_type("text/plain"),
    );

    server
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let bind_socket = config.bind_socket()?;
    let app = build_app(AppState::new(playground().into_handler()), &config.mcp_path);
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        mcp_path = %config.mcp_path,
        "server starting"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
