//! The gRPC transport server: lifecycle, accept loop, and call dispatch.

use crate::config::{ServerConfig, ServerOption};
use crate::endpoint::{self, EndpointError};
use crate::shutdown::{CallToken, InflightCalls, ShutdownSignal};
use crate::wire::{InboundCall, WireConnection, WireProtocol};
use portico_core::{
    enrich, ArcHandler, CallContext, CallError, CallInfo, Status, TargetHandle, TransportKind,
};
use portico_middleware::{Chain, Timeout};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Lifecycle states of a [`Server`].
///
/// The lifecycle is one-shot and moves strictly forward:
/// `Unstarted -> Listening -> Draining -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Constructed, not yet serving.
    Unstarted,
    /// Bound and accepting connections.
    Listening,
    /// No longer accepting; waiting for in-flight calls to finish.
    Draining,
    /// Fully drained and shut down.
    Stopped,
}

/// Errors from server lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The operation is not valid in the server's current state.
    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The state the server was in.
        state: ServerState,
    },

    /// A listen network other than `"tcp"` was configured.
    #[error("unsupported network {0:?}: only \"tcp\" is supported")]
    UnsupportedNetwork(String),

    /// Binding the listen address failed.
    #[error("failed to bind {address}")]
    Bind {
        /// The address that could not be bound.
        address: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O failure outside bind, e.g. reading the bound address back.
    #[error("transport i/o error")]
    Io(#[from] std::io::Error),
}

/// A request-dispatch server in front of a pluggable wire protocol.
///
/// The server owns the listener, the accept loop, and the graceful drain; the
/// byte-level codec is the [`WireProtocol`] collaborator. Every decoded call
/// flows through context enrichment, the timeout layer, and the configured
/// middleware chain before reaching the terminal handler.
///
/// [`start`](Self::start) runs the accept loop to completion, so callers
/// typically spawn it and use [`stop`](Self::stop) from elsewhere to initiate
/// the drain.
pub struct Server {
    config: ServerConfig,
    root: ArcHandler,
    wire: Arc<dyn WireProtocol>,
    state: watch::Sender<ServerState>,
    shutdown: ShutdownSignal,
    inflight: InflightCalls,
    bound: OnceLock<SocketAddr>,
    start_claimed: AtomicBool,
}

impl Server {
    /// Creates a server dispatching to `terminal` through the configured
    /// middleware, speaking `wire` on accepted connections.
    ///
    /// # Panics
    ///
    /// Panics if a zero per-call timeout was configured.
    #[must_use]
    pub fn new(
        terminal: ArcHandler,
        wire: impl WireProtocol,
        options: impl IntoIterator<Item = ServerOption>,
    ) -> Self {
        let config = ServerConfig::from_options(options);

        // Dispatch order: enrichment (in `dispatch`), then the timeout layer,
        // then the user chain, then the terminal handler.
        let root = Chain::new()
            .layer(Timeout::new(config.timeout()))
            .apply(config.middleware().apply(terminal));

        let (state, _) = watch::channel(ServerState::Unstarted);
        Self {
            config,
            root,
            wire: Arc::new(wire),
            state,
            shutdown: ShutdownSignal::new(),
            inflight: InflightCalls::new(),
            bound: OnceLock::new(),
            start_claimed: AtomicBool::new(false),
        }
    }

    /// The resolved configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Subscribes to lifecycle state changes.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// The bound local address, available once the server is listening.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.bound.get().copied()
    }

    /// The advertised endpoint URI, e.g. `grpc://10.0.0.5:9000`.
    ///
    /// Before the server has bound, this resolves from the configured address
    /// alone and fails if that address has no concrete port.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] if no advertisable `host:port` can be
    /// resolved yet.
    pub fn endpoint(&self) -> Result<String, EndpointError> {
        let host_port = endpoint::extract(self.config.address(), self.local_addr())?;
        Ok(endpoint::format_uri(&host_port))
    }

    /// Binds, listens, and serves until [`stop`](Self::stop) is called, then
    /// drains in-flight calls and returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the server was already started, the configured
    /// network is not `"tcp"`, or binding fails. A failed start leaves the
    /// server `Unstarted` and startable again.
    pub async fn start(&self) -> Result<(), ServerError> {
        if self
            .start_claimed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ServerError::InvalidState {
                operation: "start",
                state: self.state(),
            });
        }

        let listener = match self.bind().await {
            Ok(listener) => listener,
            Err(err) => {
                // Leave the server startable after a fixable bind failure.
                self.start_claimed.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };

        let local = listener.local_addr()?;
        let _ = self.bound.set(local);
        self.state.send_replace(ServerState::Listening);
        tracing::info!(address = %local, "server listening");

        self.accept_loop(listener).await;

        self.state.send_replace(ServerState::Draining);
        // Close admission before sampling the count, so no connection task
        // can slip a late call in once the drain has observed zero.
        self.inflight.close();
        let pending = self.inflight.count();
        tracing::info!(in_flight = pending, "draining in-flight calls");
        self.inflight.wait_idle().await;

        self.state.send_replace(ServerState::Stopped);
        tracing::info!("server stopped");
        Ok(())
    }

    /// Initiates graceful shutdown and waits until the server is stopped.
    ///
    /// Idempotent once the server has started: concurrent and repeated calls
    /// all return after the drain completes.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidState`] if the server was never started.
    pub async fn stop(&self) -> Result<(), ServerError> {
        match self.state() {
            ServerState::Unstarted => Err(ServerError::InvalidState {
                operation: "stop",
                state: ServerState::Unstarted,
            }),
            ServerState::Stopped => Ok(()),
            ServerState::Listening | ServerState::Draining => {
                tracing::info!("stop requested");
                self.shutdown.trigger();
                let mut state = self.state.subscribe();
                // The sender lives in self, so the wait cannot fail while we
                // hold a borrow.
                let _ = state.wait_for(|s| *s == ServerState::Stopped).await;
                Ok(())
            }
        }
    }

    async fn bind(&self) -> Result<TcpListener, ServerError> {
        if self.config.network() != "tcp" {
            return Err(ServerError::UnsupportedNetwork(
                self.config.network().to_owned(),
            ));
        }

        let address = bind_address(self.config.address());
        TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind { address, source })
    }

    async fn accept_loop(&self, listener: TcpListener) {
        loop {
            tokio::select! {
                () = self.shutdown.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "connection accepted");
                        let conn = self.wire.connection(stream, self.config.transport_options());
                        tokio::spawn(serve_connection(
                            conn,
                            peer,
                            Arc::clone(&self.root),
                            self.config.target().clone(),
                            self.shutdown.clone(),
                            self.inflight.clone(),
                        ));
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "accept failed");
                    }
                },
            }
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("bound", &self.local_addr())
            .finish_non_exhaustive()
    }
}

/// Turns a `":port"` shorthand into an address `TcpListener` accepts.
fn bind_address(address: &str) -> String {
    if address.starts_with(':') {
        format!("0.0.0.0{address}")
    } else {
        address.to_owned()
    }
}

/// Reads calls off one connection until shutdown or peer close, dispatching
/// each on its own task.
async fn serve_connection(
    mut conn: Box<dyn WireConnection>,
    peer: SocketAddr,
    root: ArcHandler,
    target: TargetHandle,
    shutdown: ShutdownSignal,
    inflight: InflightCalls,
) {
    loop {
        tokio::select! {
            () = shutdown.recv() => break,
            decoded = conn.next_call() => match decoded {
                Ok(Some(call)) => match inflight.try_track() {
                    Some(token) => {
                        tokio::spawn(dispatch(
                            Arc::clone(&root),
                            target.clone(),
                            call,
                            token,
                        ));
                    }
                    // The drain has closed admission; refuse the call
                    // instead of letting it start after the stop.
                    None => {
                        let (_, _, responder) = call.into_parts();
                        responder.send(Err(Status::unavailable("server is shutting down")));
                    }
                },
                Ok(None) => {
                    tracing::debug!(%peer, "peer closed connection");
                    break;
                }
                Err(err) => {
                    tracing::debug!(%peer, error = %err, "connection codec error");
                    break;
                }
            },
        }
    }
}

/// Runs one call through the composed handler and completes its responder.
async fn dispatch(root: ArcHandler, target: TargetHandle, call: InboundCall, token: CallToken) {
    let (full_method, payload, responder) = call.into_parts();
    let ctx = enrich(
        CallContext::new(),
        TransportKind::Grpc,
        CallInfo::new(target, full_method),
    );
    let call_id = ctx.call_id();

    let reply = match root.call(ctx, payload).await {
        Ok(body) => Ok(body),
        Err(CallError::Status(status)) => Err(status),
        // Reachable only when the configured chain dropped translation;
        // never let a raw error cross the transport boundary untyped.
        Err(CallError::App(err)) => Err(Status::unknown(format!("{err:#}"))),
    };

    if let Err(status) = &reply {
        tracing::debug!(%call_id, code = %status.code(), "call failed");
    }
    responder.send(reply);
    drop(token);
}
