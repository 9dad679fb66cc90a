//! Per-exchange request context handed to every method handler.

use std::sync::{Arc, Mutex, PoisonError};

use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderMap, HeaderName, HeaderValue, Method,
};

pub const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Inbound method and headers plus the response headers handlers want set.
///
/// Cheap to clone; batch entries running concurrently share one instance.
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    method: Method,
    headers: HeaderMap,
    response_headers: Mutex<HeaderMap>,
}

impl RequestContext {
    pub fn new(method: Method, headers: HeaderMap) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                method,
                headers,
                response_headers: Mutex::new(HeaderMap::new()),
            }),
        }
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    pub fn set_response_header(&self, name: HeaderName, value: HeaderValue) {
        self.inner
            .response_headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, value);
    }

    pub fn remove_response_header(&self, name: &HeaderName) {
        self.inner
            .response_headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    pub fn response_headers(&self) -> HeaderMap {
        self.inner
            .response_headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True when the client takes `*/*` or `text/event-stream`, or posts one.
    pub fn accepts_event_stream(&self) -> bool {
        let header_contains = |name: HeaderName, needle: &str| {
            self.inner
                .headers
                .get_all(name)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .any(|value| value.contains(needle))
        };

        header_contains(ACCEPT, "*/*")
            || header_contains(ACCEPT, EVENT_STREAM_MIME)
            || header_contains(CONTENT_TYPE, EVENT_STREAM_MIME)
    }
}
