//! Per-call context types.
//!
//! The [`CallContext`] is an immutable bag of per-call state passed by value
//! through the middleware chain and into the terminal handler. Deriving
//! methods (`with_*`) return a new context rather than mutating in place, so
//! every call's context, deadline, and metadata stay private to that call.

use crate::status::Status;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A unique identifier for each inbound call, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it ideal for call tracking
/// and log correlation.
///
/// # Example
///
/// ```
/// use portico_core::CallId;
///
/// let id = CallId::new();
/// println!("Call ID: {id}");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
    /// Creates a new unique call ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `CallId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A constant marker identifying which transport kind is handling a call.
///
/// Stamped onto the [`CallContext`] before the middleware chain runs so that
/// generic middleware can behave transport-agnostically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum TransportKind {
    /// The gRPC transport.
    Grpc,
}

impl TransportKind {
    /// Returns the canonical name of this transport kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grpc => "grpc",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque, cheaply cloneable reference to the serving object.
///
/// Middleware that knows the concrete service type can recover it with
/// [`TargetHandle::downcast_ref`]; everyone else treats the handle as opaque.
#[derive(Clone)]
pub struct TargetHandle(Arc<dyn Any + Send + Sync>);

impl TargetHandle {
    /// Wraps a shared service object in an opaque handle.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(target: Arc<T>) -> Self {
        Self(target)
    }

    /// Attempts to recover the concrete service type.
    ///
    /// Returns `None` if the handle was created from a different type.
    #[must_use]
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl Default for TargetHandle {
    /// A detached handle, used when the server was given no explicit target.
    fn default() -> Self {
        Self(Arc::new(()))
    }
}

impl std::fmt::Debug for TargetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TargetHandle").finish()
    }
}

/// Per-call metadata attached to the context for the duration of one call.
///
/// Read-only to middleware; discarded when the call completes.
#[derive(Debug, Clone)]
pub struct CallInfo {
    target: TargetHandle,
    full_method: String,
}

impl CallInfo {
    /// Creates call metadata for one inbound call.
    #[must_use]
    pub fn new(target: TargetHandle, full_method: impl Into<String>) -> Self {
        Self {
            target,
            full_method: full_method.into(),
        }
    }

    /// Returns the opaque handle to the serving object.
    #[must_use]
    pub fn target(&self) -> &TargetHandle {
        &self.target
    }

    /// Returns the full method name, e.g. `/helloworld.Greeter/SayHello`.
    #[must_use]
    pub fn full_method(&self) -> &str {
        &self.full_method
    }
}

/// Per-call context that flows through the middleware chain.
///
/// `CallContext` is an immutable key bag passed by value. Absence of a value
/// (deadline, transport kind, call info) is a distinguishable `None`, never a
/// fault, so contexts not produced by the server's dispatch path remain
/// usable.
///
/// # Example
///
/// ```
/// use portico_core::{CallContext, TransportKind};
///
/// let ctx = CallContext::new().with_transport_kind(TransportKind::Grpc);
/// assert_eq!(ctx.transport_kind(), Some(TransportKind::Grpc));
/// assert!(ctx.deadline().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Unique identifier for this call.
    call_id: CallId,

    /// Absolute deadline for this call, if one has been published.
    deadline: Option<Instant>,

    /// Which transport kind is handling the call.
    transport: Option<TransportKind>,

    /// Per-call metadata stamped by the dispatch path.
    call_info: Option<Arc<CallInfo>>,

    /// When this call started processing.
    started_at: Instant,
}

impl CallContext {
    /// Creates a fresh context with a new call ID and no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            call_id: CallId::new(),
            deadline: None,
            transport: None,
            call_info: None,
            started_at: Instant::now(),
        }
    }

    /// Returns the call ID.
    #[must_use]
    pub const fn call_id(&self) -> CallId {
        self.call_id
    }

    /// Returns the published deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the transport kind, if this context passed through a
    /// transport's dispatch path.
    #[must_use]
    pub const fn transport_kind(&self) -> Option<TransportKind> {
        self.transport
    }

    /// Returns the per-call metadata, if stamped.
    #[must_use]
    pub fn call_info(&self) -> Option<&CallInfo> {
        self.call_info.as_deref()
    }

    /// Returns the elapsed time since the call started processing.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Derives a context bound by `deadline`.
    ///
    /// Deadlines intersect: if this context already carries a sooner
    /// deadline, the sooner one is kept.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing <= deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Derives a context whose deadline is `timeout` from now (intersected
    /// with any existing deadline).
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a context stamped with a transport kind.
    #[must_use]
    pub fn with_transport_kind(mut self, kind: TransportKind) -> Self {
        self.transport = Some(kind);
        self
    }

    /// Derives a context carrying per-call metadata.
    #[must_use]
    pub fn with_call_info(mut self, info: CallInfo) -> Self {
        self.call_info = Some(Arc::new(info));
        self
    }

    /// Returns how much time remains before the deadline, or `None` if no
    /// deadline is published. A zero duration means the deadline has passed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` if a deadline is published and has already passed.
    #[must_use]
    pub fn deadline_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Runs `fut` to completion unless the published deadline elapses first.
    ///
    /// This is the cooperative half of timeout enforcement: the server only
    /// publishes the deadline, and deadline-aware code uses this helper (or
    /// reads [`deadline`](Self::deadline) directly) to stop work promptly.
    /// With no published deadline the future runs unbounded.
    ///
    /// # Errors
    ///
    /// Returns [`Status::deadline_exceeded`] if the deadline elapses before
    /// `fut` completes.
    pub async fn deadline_bound<F, T>(&self, fut: F) -> Result<T, Status>
    where
        F: std::future::Future<Output = T>,
    {
        match self.deadline {
            None => Ok(fut.await),
            Some(deadline) => {
                let deadline = tokio::time::Instant::from_std(deadline);
                tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| Status::deadline_exceeded("call deadline exceeded"))
            }
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Stamps transport-level call metadata onto a base context.
///
/// This is the context-enrichment step the server runs before the middleware
/// chain: the returned context carries the transport kind and the
/// [`CallInfo`] for exactly one call.
#[must_use]
pub fn enrich(base: CallContext, kind: TransportKind, info: CallInfo) -> CallContext {
    base.with_transport_kind(kind).with_call_info(info)
}
