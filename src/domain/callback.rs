//! Closure-backed handler contract shared by tools, resources and overrides.

use std::future::Future;

use futures::{future::BoxFuture, FutureExt};

use crate::mcp::{context::RequestContext, rpc::JsonRpcRequest};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One async handler: input, request context and the originating envelope in,
/// output or failure out.
pub trait Callback<I, O>: Send + Sync {
    fn invoke(
        &self,
        input: I,
        ctx: RequestContext,
        request: JsonRpcRequest,
    ) -> BoxFuture<'static, Result<O, BoxError>>;
}

impl<F, Fut, I, O> Callback<I, O> for F
where
    F: Fn(I, RequestContext, JsonRpcRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, BoxError>> + Send + 'static,
{
    fn invoke(
        &self,
        input: I,
        ctx: RequestContext,
        request: JsonRpcRequest,
    ) -> BoxFuture<'static, Result<O, BoxError>> {
        (self)(input, ctx, request).boxed()
    }
}

/// Outcome of an external fallback consulted for unknown tools or resources.
#[derive(Debug, Clone, PartialEq)]
pub enum Fallback<T> {
    Handled(T),
    NotHandled,
}

impl<T> From<Option<T>> for Fallback<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::NotHandled, Self::Handled)
    }
}
