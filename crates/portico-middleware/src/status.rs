//! Status translation middleware.
//!
//! Maps raw application errors ([`CallError::App`]) into the transport's
//! native [`Status`] representation before they leave the chain. Errors
//! already in native form pass through unchanged in identity.

use crate::middleware::{Middleware, Next};
use bytes::Bytes;
use portico_core::{BoxFuture, CallContext, CallError, CallResult, Status};

/// Middleware that normalizes outgoing errors to native status form.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusTranslation {
    _private: (),
}

impl StatusTranslation {
    /// Creates the status-translation middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl Middleware for StatusTranslation {
    fn name(&self) -> &'static str {
        "status_translation"
    }

    fn handle<'a>(
        &'a self,
        ctx: CallContext,
        request: Bytes,
        next: Next,
    ) -> BoxFuture<'a, CallResult<Bytes>> {
        Box::pin(async move {
            match next.run(ctx, request).await {
                Ok(reply) => Ok(reply),
                Err(CallError::Status(status)) => Err(status.into()),
                Err(CallError::App(err)) => Err(translate(err).into()),
            }
        })
    }
}

/// Translates an untyped application error into a native status.
///
/// An application error that wraps a [`Status`] somewhere in its chain keeps
/// that status; anything else becomes `Unknown` with the error's display
/// chain as the message.
fn translate(err: anyhow::Error) -> Status {
    match err.downcast::<Status>() {
        Ok(status) => status,
        Err(err) => Status::unknown(format!("{err:#}")),
    }
}
