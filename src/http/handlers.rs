use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Request, Uri},
    response::Response,
};

use crate::AppState;

/// Single route for every verb; gating happens inside the protocol layer.
pub async fn mcp_endpoint(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut request = Request::new(body);
    *request.method_mut() = method;
    *request.uri_mut() = uri;
    *request.headers_mut() = headers;

    state.handler.handle(request).await
}
