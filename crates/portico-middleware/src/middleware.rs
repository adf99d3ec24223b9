//! Core middleware trait and types.
//!
//! A [`Middleware`] transforms one handler into another: it receives the call
//! context, the request payload, and a [`Next`] continuation for the rest of
//! the chain. It may inspect or derive the context, short-circuit by not
//! running `next`, or transform the outgoing reply or error. It must not
//! retain the context or request beyond the call's dynamic extent.

use bytes::Bytes;
use portico_core::{ArcHandler, BoxFuture, CallContext, CallResult};
use std::future::Future;

/// The core middleware trait.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use portico_core::{BoxFuture, CallContext, CallResult};
/// use portico_middleware::{Middleware, Next};
///
/// struct Logging;
///
/// impl Middleware for Logging {
///     fn name(&self) -> &'static str {
///         "logging"
///     }
///
///     fn handle<'a>(
///         &'a self,
///         ctx: CallContext,
///         request: Bytes,
///         next: Next,
///     ) -> BoxFuture<'a, CallResult<Bytes>> {
///         Box::pin(async move {
///             tracing::debug!(call_id = %ctx.call_id(), "dispatching");
///             next.run(ctx, request).await
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    /// Returns the unique name of this middleware, used for logging and
    /// debugging.
    fn name(&self) -> &'static str;

    /// Processes one call, invoking `next` to continue down the chain.
    fn handle<'a>(
        &'a self,
        ctx: CallContext,
        request: Bytes,
        next: Next,
    ) -> BoxFuture<'a, CallResult<Bytes>>;
}

/// The continuation for the rest of the chain.
///
/// Consumed by [`run`](Next::run), so a middleware can invoke the remainder
/// of the chain at most once. Not calling it short-circuits the call.
pub struct Next {
    inner: ArcHandler,
}

impl Next {
    /// Wraps the inner handler the chain continues into.
    pub(crate) fn new(inner: ArcHandler) -> Self {
        Self { inner }
    }

    /// Invokes the rest of the chain with the given context and request.
    pub async fn run(self, ctx: CallContext, request: Bytes) -> CallResult<Bytes> {
        self.inner.call(ctx, request).await
    }
}

/// A middleware built from an async function, for simple layers that do not
/// warrant a named type.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use portico_core::CallContext;
/// use portico_middleware::{FnMiddleware, Next};
///
/// let layer = FnMiddleware::new("noop", |ctx: CallContext, request: Bytes, next: Next| {
///     async move { next.run(ctx, request).await }
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F> {
    /// Creates a new function-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(CallContext, Bytes, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallResult<Bytes>> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle<'a>(
        &'a self,
        ctx: CallContext,
        request: Bytes,
        next: Next,
    ) -> BoxFuture<'a, CallResult<Bytes>> {
        Box::pin((self.func)(ctx, request, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::{handler_fn, Status};

    #[tokio::test]
    async fn next_runs_the_inner_handler() {
        let next = Next::new(handler_fn(|_ctx, _req| async {
            Ok(Bytes::from_static(b"inner"))
        }));

        let reply = next.run(CallContext::new(), Bytes::new()).await.unwrap();
        assert_eq!(&reply[..], b"inner");
    }

    #[tokio::test]
    async fn fn_middleware_can_short_circuit() {
        let layer = FnMiddleware::new("deny", |_ctx, _req, _next| async {
            Err(Status::cancelled("short-circuited").into())
        });

        let next = Next::new(handler_fn(|_ctx, _req| async {
            panic!("terminal must not run");
        }));

        let err = layer
            .handle(CallContext::new(), Bytes::new(), next)
            .await
            .unwrap_err();
        assert_eq!(err.as_status().unwrap().code(), portico_core::Code::Cancelled);
    }

    #[test]
    fn fn_middleware_reports_its_name() {
        let layer = FnMiddleware::new("trace", |ctx, req, next: Next| async move {
            next.run(ctx, req).await
        });
        assert_eq!(layer.name(), "trace");
    }
}
