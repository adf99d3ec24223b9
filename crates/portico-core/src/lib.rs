//! # Portico Core
//!
//! Core types and traits for the portico RPC dispatch layer.
//!
//! This crate provides the foundational types used throughout portico:
//!
//! - [`CallContext`] - Per-call context carrying deadline, transport kind, and call metadata
//! - [`CallId`] - UUID v7 call identifier for log correlation
//! - [`CallInfo`] - Per-call metadata (target handle, full method name)
//! - [`Handler`] - The unit of request processing: context + request in, reply + error out
//! - [`Status`] - Transport-native error status
//! - [`CallError`] - Per-call error taxonomy

#![doc(html_root_url = "https://docs.rs/portico-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
mod handler;
mod status;

pub use context::{enrich, CallContext, CallId, CallInfo, TargetHandle, TransportKind};
pub use error::{CallError, CallResult};
pub use handler::{handler_fn, ArcHandler, BoxFuture, Handler};
pub use status::{Code, Status};
