//! Handler trait and type erasure.
//!
//! A [`Handler`] is the unit of request processing: call context plus request
//! payload in, reply payload or [`CallError`] out. Middleware composes by
//! wrapping one handler in another, so the whole chain is itself a handler.
//!
//! Handlers of different concrete types are stored uniformly behind
//! [`ArcHandler`] (`Arc<dyn Handler>`); the cost per call is one `Arc` clone
//! and one virtual dispatch.

use crate::context::CallContext;
use crate::error::CallResult;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A heap-allocated, type-erased future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The unit of request processing.
///
/// Implementations must not retain the context or request beyond the call's
/// dynamic extent.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use portico_core::{BoxFuture, CallContext, CallResult, Handler};
///
/// struct Echo;
///
/// impl Handler for Echo {
///     fn call(&self, _ctx: CallContext, request: Bytes) -> BoxFuture<'static, CallResult<Bytes>> {
///         Box::pin(async move { Ok(request) })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Handles one inbound call.
    fn call(&self, ctx: CallContext, request: Bytes) -> BoxFuture<'static, CallResult<Bytes>>;
}

/// A shared, type-erased handler.
pub type ArcHandler = Arc<dyn Handler>;

/// Newtype wrapper bridging plain async functions to the [`Handler`] trait.
struct FnHandler<F>(F);

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(CallContext, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallResult<Bytes>> + Send + 'static,
{
    fn call(&self, ctx: CallContext, request: Bytes) -> BoxFuture<'static, CallResult<Bytes>> {
        Box::pin((self.0)(ctx, request))
    }
}

/// Wraps an async function as an [`ArcHandler`].
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use portico_core::handler_fn;
///
/// let echo = handler_fn(|_ctx, request: Bytes| async move { Ok(request) });
/// ```
#[must_use]
pub fn handler_fn<F, Fut>(f: F) -> ArcHandler
where
    F: Fn(CallContext, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallResult<Bytes>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}
