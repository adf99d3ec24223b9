//! Ordered middleware composition.
//!
//! A [`Chain`] holds middleware in declaration order and composes them over a
//! terminal handler with an explicit fold, keeping the nesting order
//! auditable: for layers `[m1, m2, ..., mN]` and terminal `H0`, the fold
//! builds `HN = m1(m2(...mN(H0)...))`, so `m1` is the outermost layer.

use crate::middleware::{Middleware, Next};
use bytes::Bytes;
use portico_core::{ArcHandler, BoxFuture, CallContext, CallResult, Handler};
use std::sync::Arc;

/// An ordered composition of middleware into one handler.
///
/// # Example
///
/// ```
/// use portico_core::handler_fn;
/// use portico_middleware::{Chain, Recovery, StatusTranslation};
///
/// let chain = Chain::new()
///     .layer(Recovery::new())
///     .layer(StatusTranslation::new());
///
/// let terminal = handler_fn(|_ctx, request| async move { Ok(request) });
/// let root = chain.apply(terminal);
/// ```
#[derive(Clone, Default)]
pub struct Chain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// The standard chain: panic recovery outermost, then status translation.
    ///
    /// Recovery sits outside translation so it also contains faults raised by
    /// the translation layer itself; translation sits outside the terminal
    /// handler so raw application errors never reach the transport boundary.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .layer(crate::Recovery::new())
            .layer(crate::StatusTranslation::new())
    }

    /// Appends a middleware. Earlier-appended layers end up outermost.
    #[must_use]
    pub fn layer<M: Middleware>(self, middleware: M) -> Self {
        self.layer_arc(Arc::new(middleware))
    }

    /// Appends an already-shared middleware.
    #[must_use]
    pub fn layer_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.layers.push(middleware);
        self
    }

    /// Returns the number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if the chain has no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Returns the layer names in declaration (outermost-first) order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|m| m.name()).collect()
    }

    /// Composes the chain over `terminal`, producing the public handler.
    ///
    /// Folds back to front so the first-declared layer observes the call
    /// first and the result last.
    #[must_use]
    pub fn apply(&self, terminal: ArcHandler) -> ArcHandler {
        self.layers.iter().rev().fold(terminal, |inner, layer| {
            Arc::new(Layered {
                layer: Arc::clone(layer),
                inner,
            })
        })
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("layers", &self.names()).finish()
    }
}

/// One step of the composed chain: a middleware wrapping an inner handler.
struct Layered {
    layer: Arc<dyn Middleware>,
    inner: ArcHandler,
}

impl Handler for Layered {
    fn call(&self, ctx: CallContext, request: Bytes) -> BoxFuture<'static, CallResult<Bytes>> {
        let layer = Arc::clone(&self.layer);
        let next = Next::new(Arc::clone(&self.inner));
        Box::pin(async move { layer.handle(ctx, request, next).await })
    }
}
