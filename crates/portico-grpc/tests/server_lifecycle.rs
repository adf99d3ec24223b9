//! End-to-end server tests over a line-delimited JSON wire codec.
//!
//! The codec frames one call per line (`{"id", "method", "body"}`) and one
//! reply per line (`{"id", "body"}` or `{"id", "status"}`), multiplexing
//! replies in completion order so concurrent calls on one connection do not
//! block each other.

use bytes::Bytes;
use portico_core::{handler_fn, ArcHandler, CallContext, CallError, Code, Status};
use portico_grpc::{
    config, InboundCall, ReplyReceiver, Server, ServerError, ServerOption, ServerState,
    TransportOption, WireConnection, WireProtocol,
};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

#[derive(serde::Serialize, serde::Deserialize)]
struct Request {
    id: u64,
    method: String,
    body: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Reply {
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<Status>,
}

/// Line-delimited JSON codec used as the wire-protocol collaborator.
struct LineWire;

struct LineConnection {
    reader: BufReader<OwnedReadHalf>,
    replies: mpsc::UnboundedSender<(u64, ReplyReceiver)>,
}

impl WireProtocol for LineWire {
    fn connection(
        &self,
        stream: TcpStream,
        _options: &[TransportOption],
    ) -> Box<dyn WireConnection> {
        let (read, write) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_replies(write, rx));
        Box::new(LineConnection {
            reader: BufReader::new(read),
            replies: tx,
        })
    }
}

#[async_trait::async_trait]
impl WireConnection for LineConnection {
    async fn next_call(&mut self) -> io::Result<Option<InboundCall>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }
            let frame = line.trim();
            if frame.is_empty() {
                continue;
            }
            let request: Request = serde_json::from_str(frame)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            let (call, reply) = InboundCall::new(request.method, Bytes::from(request.body));
            let _ = self.replies.send((request.id, reply));
            return Ok(Some(call));
        }
    }
}

/// Writes replies as they complete. Pending replies keep their forwarder
/// tasks (and the line channel) alive even after the connection reader is
/// dropped, so in-flight calls still answer during drain.
async fn write_replies(
    mut write: OwnedWriteHalf,
    mut replies: mpsc::UnboundedReceiver<(u64, ReplyReceiver)>,
) {
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some((id, reply)) = replies.recv().await {
            let line_tx = line_tx.clone();
            tokio::spawn(async move {
                let outcome = reply
                    .await
                    .unwrap_or_else(|_| Err(Status::cancelled("call abandoned")));
                let frame = match outcome {
                    Ok(body) => Reply {
                        id,
                        body: Some(String::from_utf8_lossy(&body).into_owned()),
                        status: None,
                    },
                    Err(status) => Reply {
                        id,
                        body: None,
                        status: Some(status),
                    },
                };
                let _ = line_tx.send(serde_json::to_string(&frame).unwrap());
            });
        }
    });

    while let Some(line) = line_rx.recv().await {
        if write.write_all(format!("{line}\n").as_bytes()).await.is_err() {
            return;
        }
    }
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: u64,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer,
            next_id: 1,
        }
    }

    async fn send(&mut self, method: &str, body: &str) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let frame = serde_json::to_string(&Request {
            id,
            method: method.to_owned(),
            body: body.to_owned(),
        })
        .unwrap();
        self.writer
            .write_all(format!("{frame}\n").as_bytes())
            .await
            .unwrap();
        id
    }

    async fn recv(&mut self) -> Reply {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        serde_json::from_str(line.trim()).unwrap()
    }

    async fn call(&mut self, method: &str, body: &str) -> Reply {
        let id = self.send(method, body).await;
        let reply = self.recv().await;
        assert_eq!(reply.id, id);
        reply
    }
}

/// Terminal handler routing on the full method name.
fn greeter() -> ArcHandler {
    handler_fn(|ctx: CallContext, request: Bytes| async move {
        let method = ctx
            .call_info()
            .map(|info| info.full_method().to_owned())
            .unwrap_or_default();
        match method.as_str() {
            "/test.Greeter/Echo" => Ok(Bytes::from(
                String::from_utf8_lossy(&request).to_uppercase(),
            )),
            "/test.Greeter/Describe" => {
                let kind = ctx
                    .transport_kind()
                    .map(|k| k.to_string())
                    .unwrap_or_default();
                Ok(Bytes::from(format!("{kind} {method}")))
            }
            "/test.Greeter/Panic" => panic!("handler blew up"),
            "/test.Greeter/Fail" => Err(CallError::msg("backend exploded")),
            "/test.Greeter/Sleep" => {
                ctx.deadline_bound(sleep(Duration::from_millis(500))).await?;
                Ok(request)
            }
            "/test.Greeter/Nap" => {
                sleep(Duration::from_millis(150)).await;
                Ok(Bytes::from_static(b"rested"))
            }
            _ => Err(Status::unimplemented(format!("unknown method {method}")).into()),
        }
    })
}

async fn start_server(
    extra: Vec<ServerOption>,
) -> (Arc<Server>, JoinHandle<Result<(), ServerError>>, SocketAddr) {
    let mut options = vec![config::address("127.0.0.1:0")];
    options.extend(extra);
    let server = Arc::new(Server::new(greeter(), LineWire, options));

    let handle = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.start().await })
    };
    let mut states = server.state_changes();
    states
        .wait_for(|s| *s == ServerState::Listening)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    (server, handle, addr)
}

async fn shut_down(server: &Arc<Server>, handle: JoinHandle<Result<(), ServerError>>) {
    server.stop().await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn calls_flow_through_dispatch_and_back() {
    let (server, handle, addr) = start_server(vec![]).await;
    let mut client = Client::connect(addr).await;

    let reply = client.call("/test.Greeter/Echo", "hello").await;
    assert_eq!(reply.body.as_deref(), Some("HELLO"));
    assert!(reply.status.is_none());

    shut_down(&server, handle).await;
}

#[tokio::test]
async fn context_carries_transport_kind_and_method() {
    let (server, handle, addr) = start_server(vec![]).await;
    let mut client = Client::connect(addr).await;

    let reply = client.call("/test.Greeter/Describe", "").await;
    assert_eq!(reply.body.as_deref(), Some("grpc /test.Greeter/Describe"));

    shut_down(&server, handle).await;
}

#[tokio::test]
async fn panicking_call_yields_internal_and_server_keeps_serving() {
    let (server, handle, addr) = start_server(vec![]).await;
    let mut client = Client::connect(addr).await;

    const FAULTS: u64 = 16;
    let mut ids = Vec::new();
    for _ in 0..FAULTS {
        ids.push(client.send("/test.Greeter/Panic", "").await);
    }
    for _ in 0..FAULTS {
        let reply = client.recv().await;
        assert!(ids.contains(&reply.id));
        let status = reply.status.expect("panic must surface as a status reply");
        assert_eq!(status.code(), Code::Internal);
    }

    // Every fault was contained to its own call.
    let reply = client.call("/test.Greeter/Echo", "still alive").await;
    assert_eq!(reply.body.as_deref(), Some("STILL ALIVE"));

    shut_down(&server, handle).await;
}

#[tokio::test]
async fn slow_call_times_out_with_deadline_exceeded() {
    let (server, handle, addr) =
        start_server(vec![config::timeout(Duration::from_millis(50))]).await;
    let mut client = Client::connect(addr).await;

    let begun = Instant::now();
    let reply = client.call("/test.Greeter/Sleep", "").await;
    let status = reply.status.expect("must time out");
    assert_eq!(status.code(), Code::DeadlineExceeded);
    // Bounded by the 50ms deadline, not the handler's 500ms sleep.
    assert!(begun.elapsed() < Duration::from_millis(500));

    shut_down(&server, handle).await;
}

#[tokio::test]
async fn app_error_translates_to_unknown_status() {
    let (server, handle, addr) = start_server(vec![]).await;
    let mut client = Client::connect(addr).await;

    let reply = client.call("/test.Greeter/Fail", "").await;
    let status = reply.status.expect("raw errors must leave as statuses");
    assert_eq!(status.code(), Code::Unknown);
    assert!(status.message().contains("backend exploded"));

    shut_down(&server, handle).await;
}

#[tokio::test]
async fn unknown_method_gets_unimplemented() {
    let (server, handle, addr) = start_server(vec![]).await;
    let mut client = Client::connect(addr).await;

    let reply = client.call("/test.Greeter/NoSuchMethod", "").await;
    assert_eq!(reply.status.unwrap().code(), Code::Unimplemented);

    shut_down(&server, handle).await;
}

#[tokio::test]
async fn concurrent_calls_on_one_connection_do_not_block_each_other() {
    let (server, handle, addr) = start_server(vec![]).await;
    let mut client = Client::connect(addr).await;

    let slow = client.send("/test.Greeter/Nap", "").await;
    let fast = client.send("/test.Greeter/Echo", "quick").await;

    // The fast call answers first even though it was sent second.
    let first = client.recv().await;
    assert_eq!(first.id, fast);
    assert_eq!(first.body.as_deref(), Some("QUICK"));

    let second = client.recv().await;
    assert_eq!(second.id, slow);
    assert_eq!(second.body.as_deref(), Some("rested"));

    shut_down(&server, handle).await;
}

#[tokio::test]
async fn stop_waits_for_in_flight_calls() {
    let (server, handle, addr) = start_server(vec![]).await;
    let mut client = Client::connect(addr).await;

    let id = client.send("/test.Greeter/Nap", "").await;
    sleep(Duration::from_millis(30)).await;

    let begun = Instant::now();
    let stopper = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.stop().await })
    };

    // The in-flight call still completes and its reply still arrives.
    let reply = client.recv().await;
    assert_eq!(reply.id, id);
    assert_eq!(reply.body.as_deref(), Some("rested"));

    stopper.await.unwrap().unwrap();
    // Stop returned only after the 150ms call drained.
    assert!(begun.elapsed() >= Duration::from_millis(100));
    assert_eq!(server.state(), ServerState::Stopped);
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn stopped_server_refuses_new_connections() {
    let (server, handle, addr) = start_server(vec![]).await;
    shut_down(&server, handle).await;

    let refused = TcpStream::connect(addr).await;
    assert!(refused.is_err());
}
