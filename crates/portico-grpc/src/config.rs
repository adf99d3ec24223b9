//! Server configuration assembled from ordered options.
//!
//! Construction takes an ordered list of [`ServerOption`] mutators applied
//! over defaults; when two options touch the same field, the later one wins.

use crate::wire::TransportOption;
use portico_core::TargetHandle;
use portico_middleware::Chain;
use std::time::Duration;

/// Default per-call timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default listen network.
pub const DEFAULT_NETWORK: &str = "tcp";

/// Default listen address: all interfaces, OS-assigned port.
pub const DEFAULT_ADDRESS: &str = ":0";

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    network: String,
    address: String,
    timeout: Duration,
    middleware: Chain,
    transport_options: Vec<TransportOption>,
    target: TargetHandle,
}

impl ServerConfig {
    /// Applies `options` in order over the defaults.
    #[must_use]
    pub fn from_options(options: impl IntoIterator<Item = ServerOption>) -> Self {
        let mut config = Self::default();
        for option in options {
            (option.0)(&mut config);
        }
        config
    }

    /// The listen network. Only `"tcp"` is accepted at start time.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.network
    }

    /// The configured listen address, e.g. `":0"` or `"0.0.0.0:9000"`.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The per-call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The middleware chain applied to every call.
    #[must_use]
    pub const fn middleware(&self) -> &Chain {
        &self.middleware
    }

    /// Knobs forwarded verbatim to the wire protocol.
    #[must_use]
    pub fn transport_options(&self) -> &[TransportOption] {
        &self.transport_options
    }

    /// The opaque service-target handle stamped into each call's context.
    #[must_use]
    pub const fn target(&self) -> &TargetHandle {
        &self.target
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_owned(),
            address: DEFAULT_ADDRESS.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            middleware: Chain::standard(),
            transport_options: Vec::new(),
            target: TargetHandle::default(),
        }
    }
}

/// One ordered configuration mutator.
pub struct ServerOption(Box<dyn FnOnce(&mut ServerConfig) + Send>);

impl ServerOption {
    fn new(f: impl FnOnce(&mut ServerConfig) + Send + 'static) -> Self {
        Self(Box::new(f))
    }
}

impl std::fmt::Debug for ServerOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ServerOption")
    }
}

/// Sets the listen network.
#[must_use]
pub fn network(network: impl Into<String>) -> ServerOption {
    let network = network.into();
    ServerOption::new(move |c| c.network = network)
}

/// Sets the listen address.
#[must_use]
pub fn address(address: impl Into<String>) -> ServerOption {
    let address = address.into();
    ServerOption::new(move |c| c.address = address)
}

/// Sets the per-call timeout. Must be greater than zero.
#[must_use]
pub fn timeout(timeout: Duration) -> ServerOption {
    ServerOption::new(move |c| c.timeout = timeout)
}

/// Replaces the middleware chain. The default is
/// [`Chain::standard`]; replacing it takes full ownership of error
/// translation and panic containment.
#[must_use]
pub fn middleware(chain: Chain) -> ServerOption {
    ServerOption::new(move |c| c.middleware = chain)
}

/// Replaces the transport options forwarded to the wire protocol.
#[must_use]
pub fn transport_options(options: Vec<TransportOption>) -> ServerOption {
    ServerOption::new(move |c| c.transport_options = options)
}

/// Sets the opaque service-target handle surfaced via call info.
#[must_use]
pub fn target(target: TargetHandle) -> ServerOption {
    ServerOption::new(move |c| c.target = target)
}
