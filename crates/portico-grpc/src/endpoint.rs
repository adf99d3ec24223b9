//! Advertised-endpoint resolution.
//!
//! Turns the configured listen address plus the actual bound socket into a
//! `grpc://host:port` URI that peers can dial. A concrete configured host is
//! trusted as-is; a wildcard host is replaced with an address reachable from
//! off-box.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

/// The URI scheme this transport advertises.
pub const SCHEME: &str = "grpc";

/// Failure to resolve an advertisable endpoint.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// The configured address does not look like `host:port`.
    #[error("invalid listen address {0:?}")]
    InvalidAddress(String),
    /// The server is not bound and the configured address has no concrete
    /// port to advertise.
    #[error("endpoint not resolvable yet: not bound and {0:?} has no concrete port")]
    Unresolvable(String),
}

/// Resolves the advertised `host:port` for a configured address and, when the
/// server has bound, the actual local socket address.
pub(crate) fn extract(
    configured: &str,
    bound: Option<SocketAddr>,
) -> Result<String, EndpointError> {
    let (host, port_str) = configured
        .rsplit_once(':')
        .ok_or_else(|| EndpointError::InvalidAddress(configured.to_owned()))?;

    let port = match bound {
        Some(addr) => addr.port(),
        None => {
            let parsed: u16 = port_str
                .parse()
                .map_err(|_| EndpointError::InvalidAddress(configured.to_owned()))?;
            if parsed == 0 {
                return Err(EndpointError::Unresolvable(configured.to_owned()));
            }
            parsed
        }
    };

    if !host.is_empty() && !is_wildcard(host) {
        return Ok(join(host, port));
    }

    let ip = match bound {
        Some(addr) if !addr.ip().is_unspecified() => addr.ip(),
        _ => outbound_ip(),
    };
    Ok(join(&ip.to_string(), port))
}

/// Formats the advertised URI.
pub(crate) fn format_uri(host_port: &str) -> String {
    format!("{SCHEME}://{host_port}")
}

fn is_wildcard(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}

fn join(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Best-effort discovery of the interface address used for outbound traffic.
///
/// Connecting a UDP socket selects a route without sending any packets. Falls
/// back to loopback when the host has no usable route.
fn outbound_ip() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect("8.8.8.8:80")?;
        Ok(socket.local_addr()?.ip())
    };
    probe().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddrV4;

    fn bound(ip: [u8; 4], port: u16) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(ip.into(), port))
    }

    #[test]
    fn concrete_host_is_kept_verbatim() {
        let got = extract("10.0.0.5:9000", Some(bound([10, 0, 0, 5], 9000))).unwrap();
        assert_eq!(got, "10.0.0.5:9000");
    }

    #[test]
    fn hostname_is_kept_verbatim() {
        let got = extract("greeter.internal:443", None).unwrap();
        assert_eq!(got, "greeter.internal:443");
    }

    #[test]
    fn bound_port_replaces_configured_zero() {
        let got = extract("127.0.0.1:0", Some(bound([127, 0, 0, 1], 41234))).unwrap();
        assert_eq!(got, "127.0.0.1:41234");
    }

    #[test]
    fn wildcard_host_becomes_concrete() {
        let got = extract(":0", Some(bound([0, 0, 0, 0], 41234))).unwrap();
        let (host, port) = got.rsplit_once(':').unwrap();
        assert_eq!(port, "41234");
        assert!(!host.is_empty());
        assert_ne!(host, "0.0.0.0");
    }

    #[test]
    fn unbound_wildcard_port_is_unresolvable() {
        let err = extract(":0", None).unwrap_err();
        assert!(matches!(err, EndpointError::Unresolvable(_)));
    }

    #[test]
    fn unbound_concrete_port_resolves() {
        let got = extract("192.168.1.10:9000", None).unwrap();
        assert_eq!(got, "192.168.1.10:9000");
    }

    #[test]
    fn missing_port_separator_is_invalid() {
        let err = extract("localhost", None).unwrap_err();
        assert!(matches!(err, EndpointError::InvalidAddress(_)));
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        assert_eq!(join("::1", 9000), "[::1]:9000");
        assert_eq!(join("[::1]", 9000), "[::1]:9000");
    }

    #[test]
    fn uri_carries_the_grpc_scheme() {
        assert_eq!(format_uri("10.0.0.5:9000"), "grpc://10.0.0.5:9000");
    }
}
