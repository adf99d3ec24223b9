//! # Portico
//!
//! A request-dispatch layer for RPC servers: composable middleware, per-call
//! context with cooperative deadlines, and a gRPC transport server with a
//! graceful, drain-on-stop lifecycle.
//!
//! The framework splits into three member crates, re-exported here:
//!
//! - [`core`]: call context, handler trait, status and error taxonomy
//! - [`middleware`]: the chain and the built-in recovery, translation, and
//!   timeout layers
//! - [`grpc`]: the transport server, its configuration options, and the
//!   wire-protocol collaborator seam
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use portico::prelude::*;
//! use portico::grpc::config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let terminal = handler_fn(|_ctx, request| async move { Ok(request) });
//!     let server = Server::new(
//!         terminal,
//!         my_codec(),
//!         [
//!             config::address("0.0.0.0:9000"),
//!             config::timeout(Duration::from_secs(2)),
//!         ],
//!     );
//!     server.start().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Dispatch pipeline
//!
//! Every decoded call flows through a fixed outer shape:
//!
//! ```text
//! call -> enrichment -> timeout -> middleware chain -> terminal handler
//! ```
//!
//! The default chain puts panic recovery outermost and status translation
//! just inside it, so faults become `Internal` statuses and raw application
//! errors never cross the transport boundary untyped.

pub use portico_core as core;

pub use portico_grpc as grpc;

pub use portico_middleware as middleware;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use portico::prelude::*;
/// ```
pub mod prelude {
    pub use portico_core::{
        enrich, handler_fn, ArcHandler, CallContext, CallError, CallId, CallInfo, CallResult,
        Code, Handler, Status, TargetHandle, TransportKind,
    };

    pub use portico_middleware::{Chain, Middleware, Next, Recovery, StatusTranslation, Timeout};

    pub use portico_grpc::{
        Server, ServerConfig, ServerError, ServerOption, ServerState, TransportOption,
        WireConnection, WireProtocol,
    };
}
