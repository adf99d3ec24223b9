//! gRPC transport server for portico.
//!
//! This crate provides the request-dispatch layer in front of a pluggable
//! wire protocol: the [`Server`] owns the listener, the accept loop, per-call
//! dispatch through the middleware chain, and a graceful drain on stop. The
//! byte-level codec is the [`WireProtocol`] collaborator.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use portico_core::handler_fn;
//! use portico_grpc::{config, Server};
//! # use portico_grpc::{InboundCall, TransportOption, WireConnection, WireProtocol};
//! # struct MyCodec;
//! # struct MyConn;
//! # #[async_trait::async_trait]
//! # impl WireConnection for MyConn {
//! #     async fn next_call(&mut self) -> std::io::Result<Option<InboundCall>> { Ok(None) }
//! # }
//! # impl WireProtocol for MyCodec {
//! #     fn connection(
//! #         &self,
//! #         _stream: tokio::net::TcpStream,
//! #         _options: &[TransportOption],
//! #     ) -> Box<dyn WireConnection> { Box::new(MyConn) }
//! # }
//!
//! # async fn run() -> Result<(), portico_grpc::ServerError> {
//! let terminal = handler_fn(|_ctx, request| async move { Ok(request) });
//! let server = Server::new(
//!     terminal,
//!     MyCodec,
//!     [
//!         config::address("0.0.0.0:9000"),
//!         config::timeout(Duration::from_secs(2)),
//!     ],
//! );
//! server.start().await
//! # }
//! ```

pub mod config;
pub mod endpoint;
mod server;
mod shutdown;
mod wire;

pub use config::{ServerConfig, ServerOption};
pub use endpoint::EndpointError;
pub use server::{Server, ServerError, ServerState};
pub use shutdown::{CallToken, InflightCalls, ShutdownSignal};
pub use wire::{InboundCall, ReplyReceiver, Responder, TransportOption, WireConnection, WireProtocol};
