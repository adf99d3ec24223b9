//! The wire-protocol collaborator boundary.
//!
//! The server owns the listener, the accept loop, and the drain protocol; the
//! byte-level codec behind each accepted connection is a pluggable
//! collaborator. A [`WireProtocol`] turns an accepted stream into a
//! [`WireConnection`], and the connection yields framed [`InboundCall`]s for
//! the server to dispatch. Replies travel back through the call's
//! [`Responder`].

use async_trait::async_trait;
use bytes::Bytes;
use portico_core::Status;
use std::io;
use tokio::net::TcpStream;
use tokio::sync::oneshot;

/// Transport-level knobs forwarded verbatim to the wire protocol.
///
/// The server does not interpret these; it hands the full set to
/// [`WireProtocol::connection`] for each accepted stream.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportOption {
    /// Disable Nagle's algorithm on accepted sockets.
    TcpNodelay(bool),
    /// Upper bound on concurrently open calls per connection.
    MaxConcurrentCalls(usize),
    /// Initial per-connection flow-control window, in bytes.
    InitialWindowSize(u32),
}

/// Receiving end of one call's reply, held by the wire protocol.
pub type ReplyReceiver = oneshot::Receiver<Result<Bytes, Status>>;

/// One framed inbound call, decoded by the wire protocol.
#[derive(Debug)]
pub struct InboundCall {
    full_method: String,
    payload: Bytes,
    responder: Responder,
}

impl InboundCall {
    /// Creates a call and the receiver its reply will arrive on.
    ///
    /// Wire-protocol implementations call this while decoding; the server
    /// completes the [`Responder`] exactly once per call.
    #[must_use]
    pub fn new(full_method: impl Into<String>, payload: Bytes) -> (Self, ReplyReceiver) {
        let (tx, rx) = oneshot::channel();
        let call = Self {
            full_method: full_method.into(),
            payload,
            responder: Responder { tx },
        };
        (call, rx)
    }

    /// The fully-qualified method name, e.g. `/helloworld.Greeter/SayHello`.
    #[must_use]
    pub fn full_method(&self) -> &str {
        &self.full_method
    }

    /// Decomposes the call for dispatch.
    #[must_use]
    pub fn into_parts(self) -> (String, Bytes, Responder) {
        (self.full_method, self.payload, self.responder)
    }
}

/// Completes one call with its reply.
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<Result<Bytes, Status>>,
}

impl Responder {
    /// Sends the reply. If the wire side has already torn the call down
    /// (peer gone, connection closed), the reply is discarded.
    pub fn send(self, reply: Result<Bytes, Status>) {
        let _ = self.tx.send(reply);
    }
}

/// One accepted connection, decoded into a stream of calls.
///
/// Implementations must not abandon replies for calls they have already
/// yielded: a call's reply path has to stay live even after the connection
/// value itself is dropped, so that in-flight calls can complete during
/// drain.
#[async_trait]
pub trait WireConnection: Send {
    /// Decodes the next inbound call.
    ///
    /// Returns `Ok(None)` when the peer closes the connection cleanly.
    async fn next_call(&mut self) -> io::Result<Option<InboundCall>>;
}

/// Factory for per-connection codecs.
pub trait WireProtocol: Send + Sync + 'static {
    /// Wraps an accepted stream in a connection codec.
    fn connection(
        &self,
        stream: TcpStream,
        options: &[TransportOption],
    ) -> Box<dyn WireConnection>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn responder_delivers_reply() {
        let (call, rx) = InboundCall::new("/test.Svc/Echo", Bytes::from_static(b"hi"));
        assert_eq!(call.full_method(), "/test.Svc/Echo");

        let (method, payload, responder) = call.into_parts();
        assert_eq!(method, "/test.Svc/Echo");
        assert_eq!(&payload[..], b"hi");

        responder.send(Ok(Bytes::from_static(b"hello")));
        let reply = rx.await.unwrap().unwrap();
        assert_eq!(&reply[..], b"hello");
    }

    #[tokio::test]
    async fn reply_to_departed_peer_is_discarded() {
        let (call, rx) = InboundCall::new("/test.Svc/Echo", Bytes::new());
        drop(rx);

        // Must not panic or error out of the dispatch path.
        let (_, _, responder) = call.into_parts();
        responder.send(Err(Status::cancelled("peer went away")));
    }
}
