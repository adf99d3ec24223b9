//! Panic recovery middleware.
//!
//! Any panic raised within the wrapped handler's dynamic extent is caught
//! here, logged, and converted into a well-formed `Internal` status. A
//! faulting call terminates with an error reply; the server keeps serving.
//!
//! Position this layer outermost (as [`Chain::standard`](crate::Chain::standard)
//! does) so it also contains faults raised by inner middleware such as status
//! translation.

use crate::middleware::{Middleware, Next};
use bytes::Bytes;
use futures::FutureExt;
use portico_core::{BoxFuture, CallContext, CallResult, Status};
use std::any::Any;
use std::panic::AssertUnwindSafe;

/// Middleware that converts panics into `Internal` status errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recovery {
    _private: (),
}

impl Recovery {
    /// Creates the recovery middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl Middleware for Recovery {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn handle<'a>(
        &'a self,
        ctx: CallContext,
        request: Bytes,
        next: Next,
    ) -> BoxFuture<'a, CallResult<Bytes>> {
        Box::pin(async move {
            let call_id = ctx.call_id();
            let method = ctx
                .call_info()
                .map(|info| info.full_method().to_owned());

            match AssertUnwindSafe(next.run(ctx, request)).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    tracing::error!(
                        %call_id,
                        method = method.as_deref().unwrap_or("<unknown>"),
                        panic = panic_message(payload.as_ref()),
                        "handler panicked; converting to internal status"
                    );
                    Err(Status::internal("internal server error").into())
                }
            }
        })
    }
}

/// Extracts the message from a panic payload, if it carries one.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
