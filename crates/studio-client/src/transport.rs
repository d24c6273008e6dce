//! WebSocket transport.
//!
//! Owns the socket of one connection: opening it, pumping frames in both
//! directions, and reporting its end exactly once. The outbound half is a
//! channel slot that is only filled while the owning client is `Connected`,
//! so [`Transport::send`] never buffers for a socket that does not exist.

use crate::error::{ClientError, ClientResult};
use crate::protocol::RpcMessage;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::future::Future;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

/// An open daemon socket.
pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a socket to `url`.
pub(crate) async fn open(url: &Url) -> Result<WsStream, tungstenite::Error> {
    let (stream, _response) = connect_async(url.as_str()).await?;
    Ok(stream)
}

/// Outbound side of the current connection, if any.
#[derive(Default)]
pub(crate) struct Transport {
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

impl Transport {
    /// Make `send` usable for a freshly opened socket.
    pub(crate) fn attach(&self, outbound: mpsc::UnboundedSender<Message>) {
        *self.outbound.lock() = Some(outbound);
    }

    /// Make `send` fail with `NotConnected` from now on.
    pub(crate) fn detach(&self) {
        self.outbound.lock().take();
    }

    #[cfg(test)]
    pub(crate) fn is_attached(&self) -> bool {
        self.outbound.lock().is_some()
    }

    /// Serialize and queue `message` on the open socket.
    pub(crate) fn send(&self, message: &RpcMessage) -> ClientResult<()> {
        let text = message.encode()?;
        let outbound = self.outbound.lock();
        let Some(sender) = outbound.as_ref() else {
            return Err(ClientError::NotConnected);
        };
        sender
            .send(Message::Text(text.into()))
            .map_err(|_| ClientError::NotConnected)
    }
}

/// Drive one open socket until it ends or `interrupt` completes.
///
/// Text frames (and UTF-8 binary frames) are handed to `on_text`. Returns
/// `None` when the socket closed or failed, which is the single disconnect
/// notification for this connection; close frames, read errors, and write
/// errors all end up here. Returns the interrupt's output after sending a
/// close frame otherwise.
pub(crate) async fn pump<F>(
    stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    mut on_text: impl FnMut(&str),
    interrupt: F,
) -> Option<F::Output>
where
    F: Future,
{
    let (mut write, mut read) = stream.split();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            output = &mut interrupt => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!(error = %e, "Failed to send close frame");
                }
                return Some(output);
            }
            Some(message) = outbound.recv() => {
                if let Err(e) = write.send(message).await {
                    warn!(error = %e, "Failed to write frame");
                    return None;
                }
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => on_text(text.as_str()),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => on_text(text),
                    Err(_) => debug!(len = bytes.len(), "Dropped non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = write.send(Message::Pong(data)).await {
                        debug!(error = %e, "Failed to answer ping");
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Daemon closed connection");
                    return None;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket read failed");
                    return None;
                }
                None => return None,
            },
        }
    }
}
