//! Timeout enforcement middleware.
//!
//! Bounds total handling time for one call by publishing a deadline on the
//! derived call context. Enforcement is cooperative: this layer never aborts
//! the in-flight invocation. Downstream code (I/O, sub-calls, or
//! [`CallContext::deadline_bound`]) observes the deadline and stops work
//! promptly. Deadlines intersect: an incoming context that already carries a
//! sooner deadline keeps it.

use crate::middleware::{Middleware, Next};
use bytes::Bytes;
use portico_core::{BoxFuture, CallContext, CallResult};
use std::time::Duration;

/// Middleware that publishes a per-call deadline.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use portico_middleware::{Chain, Timeout};
///
/// let chain = Chain::standard().layer(Timeout::new(Duration::from_secs(1)));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    /// Creates a timeout layer with the given per-call duration.
    ///
    /// # Panics
    ///
    /// Panics if `duration` is zero; a zero timeout is a construction-time
    /// programmer error.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        assert!(!duration.is_zero(), "call timeout must be greater than zero");
        Self { duration }
    }

    /// Returns the configured duration.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }
}

impl Middleware for Timeout {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn handle<'a>(
        &'a self,
        ctx: CallContext,
        request: Bytes,
        next: Next,
    ) -> BoxFuture<'a, CallResult<Bytes>> {
        let bound = ctx.with_timeout(self.duration);
        Box::pin(async move { next.run(bound, request).await })
    }
}
