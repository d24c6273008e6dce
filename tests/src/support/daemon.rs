//! In-process stand-in for a CraftOBJ daemon's WebSocket endpoint.
//!
//! Every accepted socket is handed to the test as a [`DaemonConnection`],
//! which the test drives explicitly: read a request, answer it, push an
//! event, or drop the socket.

use super::WAIT;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

/// A mock daemon listening on `127.0.0.1:<ephemeral>`.
pub struct MockDaemon {
    addr: SocketAddr,
    refusing: Arc<AtomicBool>,
    stalling: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
    accepted: mpsc::UnboundedReceiver<DaemonConnection>,
    task: JoinHandle<()>,
}

impl MockDaemon {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock daemon");
        let addr = listener.local_addr().expect("local addr");
        let refusing = Arc::new(AtomicBool::new(false));
        let stalling = Arc::new(AtomicBool::new(false));
        let attempts = Arc::new(AtomicUsize::new(0));
        let (tx, accepted) = mpsc::unbounded_channel();

        let task = tokio::spawn({
            let refusing = refusing.clone();
            let stalling = stalling.clone();
            let attempts = attempts.clone();
            async move {
                let mut stalled = Vec::new();
                while let Ok((tcp, _)) = listener.accept().await {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    if refusing.load(Ordering::SeqCst) {
                        drop(tcp);
                        continue;
                    }
                    if stalling.load(Ordering::SeqCst) {
                        stalled.push(tcp);
                        continue;
                    }
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let uri = Arc::new(Mutex::new(String::new()));
                        let seen = uri.clone();
                        let record = move |request: &Request, response: Response| {
                            *seen.lock() = request.uri().to_string();
                            Ok::<_, ErrorResponse>(response)
                        };
                        if let Ok(ws) = accept_hdr_async(tcp, record).await {
                            let uri = uri.lock().clone();
                            let _ = tx.send(DaemonConnection { ws, uri });
                        }
                    });
                }
            }
        });

        Self {
            addr,
            refusing,
            stalling,
            attempts,
            accepted,
            task,
        }
    }

    /// `ws://127.0.0.1:<port>/ws`
    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// While set, TCP connections are accepted and dropped before the
    /// WebSocket handshake.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refusing.store(refuse, Ordering::SeqCst);
    }

    /// While set, TCP connections are accepted and held open without ever
    /// answering the WebSocket handshake.
    pub fn stall_handshakes(&self, stall: bool) {
        self.stalling.store(stall, Ordering::SeqCst);
    }

    /// TCP connections seen so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The next completed handshake.
    pub async fn next_connection(&mut self) -> DaemonConnection {
        tokio::time::timeout(WAIT, self.accepted.recv())
            .await
            .expect("no client connected in time")
            .expect("accept loop ended")
    }
}

impl Drop for MockDaemon {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A request as the daemon received it.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingRequest {
    pub id: u64,
    pub method: String,
    pub params: Option<Value>,
}

/// How [`DaemonConnection::serve`] answers one request.
pub enum Reply {
    Result(Value),
    Error { code: i64, message: String },
    Ignore,
}

/// One accepted client socket.
pub struct DaemonConnection {
    ws: WebSocketStream<TcpStream>,
    uri: String,
}

impl DaemonConnection {
    /// Request target of the handshake, e.g. `/ws?key=abc`.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Next JSON-RPC request from the client.
    ///
    /// Panics if the socket closes first or nothing arrives in time.
    pub async fn recv_request(&mut self) -> IncomingRequest {
        tokio::time::timeout(WAIT, self.read_request())
            .await
            .expect("no request arrived in time")
            .expect("client closed the socket")
    }

    async fn read_request(&mut self) -> Option<IncomingRequest> {
        while let Some(frame) = self.ws.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text.as_str().to_string(),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            };
            let value: Value = serde_json::from_str(&text).expect("client sent valid JSON");
            assert_eq!(value["jsonrpc"], "2.0");
            return Some(IncomingRequest {
                id: value["id"].as_u64().expect("request id"),
                method: value["method"].as_str().expect("method").to_string(),
                params: value.get("params").cloned(),
            });
        }
        None
    }

    pub async fn respond(&mut self, id: u64, result: Value) {
        self.send_json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
            .await;
    }

    pub async fn respond_error(&mut self, id: u64, code: i64, message: &str) {
        self.send_json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message },
        }))
        .await;
    }

    /// Push a notification: `method` and `params`, no `id`.
    pub async fn push_event(&mut self, method: &str, params: Value) {
        self.send_json(json!({ "jsonrpc": "2.0", "method": method, "params": params }))
            .await;
    }

    /// Send an arbitrary text frame.
    pub async fn send_raw(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string().into()))
            .await
            .expect("send frame");
    }

    async fn send_json(&mut self, value: Value) {
        self.send_raw(&value.to_string()).await;
    }

    /// Ping the client and return the payload of its pong.
    pub async fn ping(&mut self, payload: &[u8]) -> Vec<u8> {
        self.ws
            .send(Message::Ping(payload.to_vec().into()))
            .await
            .expect("send ping");
        tokio::time::timeout(WAIT, async {
            while let Some(frame) = self.ws.next().await {
                match frame {
                    Ok(Message::Pong(data)) => return data.to_vec(),
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            panic!("client closed the socket before answering the ping")
        })
        .await
        .expect("no pong arrived in time")
    }

    /// Close the socket from the daemon side.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }

    /// Wait until the client closes the socket.
    pub async fn wait_closed(&mut self) {
        tokio::time::timeout(WAIT, async {
            while let Some(frame) = self.ws.next().await {
                if matches!(frame, Ok(Message::Close(_)) | Err(_)) {
                    break;
                }
            }
        })
        .await
        .expect("client did not close the socket");
    }

    /// Answer requests with `handler` until the client goes away.
    pub async fn serve<F>(mut self, mut handler: F)
    where
        F: FnMut(&IncomingRequest) -> Reply,
    {
        while let Some(request) = self.read_request().await {
            match handler(&request) {
                Reply::Result(result) => self.respond(request.id, result).await,
                Reply::Error { code, message } => {
                    self.respond_error(request.id, code, &message).await
                }
                Reply::Ignore => {}
            }
        }
    }
}
