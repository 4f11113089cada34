//! DevTools control channel: JSON-RPC over a WebSocket.
//!
//! A reader task owns the receiving half of the socket. It resolves pending commands
//! by `id` and forwards `Network.responseReceived` notifications, in arrival order,
//! into an unbounded channel that the listener drains. When the socket ends, the
//! reader reports a single event-stream error and fails every pending command.

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::{ConnectionError, Error, Result};
use crate::types::ResponseEvent;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type CommandReply = std::result::Result<Value, String>;
type PendingCommands = Arc<Mutex<HashMap<u64, oneshot::Sender<CommandReply>>>>;

/// Notification carrying one observed network response
const RESPONSE_RECEIVED: &str = "Network.responseReceived";

/// Receiving side of the response event feed
pub(crate) type ResponseFeed = mpsc::UnboundedReceiver<Result<ResponseEvent>>;

/// Live debugging session attached to one page target
pub struct Session {
    target_url: String,
    sink: Mutex<SplitSink<WsStream, Message>>,
    pending: PendingCommands,
    next_id: AtomicU64,
    responses: Option<ResponseFeed>,
    reader: JoinHandle<()>,
    command_timeout: Duration,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target_url", &self.target_url)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

/// Incoming frame: either a command reply (`id`) or a notification (`method`)
#[derive(Debug, Deserialize)]
struct Incoming {
    id: Option<u64>,
    method: Option<String>,
    #[serde(default)]
    params: Value,
    result: Option<Value>,
    error: Option<RemoteError>,
}

#[derive(Debug, Deserialize)]
struct RemoteError {
    code: i64,
    message: String,
}

impl Session {
    /// Open the control channel at `ws_url`
    pub async fn open(
        ws_url: &str,
        connect_timeout: Duration,
        command_timeout: Duration,
    ) -> Result<Self> {
        let handshake = tokio::time::timeout(connect_timeout, connect_async(ws_url)).await;
        let (socket, _) = match handshake {
            Ok(Ok(pair)) => pair,
            Ok(Err(source)) => {
                return Err(ConnectionError::WebSocket {
                    url: ws_url.to_string(),
                    source,
                }
                .into());
            }
            Err(_) => {
                return Err(ConnectionError::WebSocket {
                    url: ws_url.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "handshake timed out",
                    )
                    .into(),
                }
                .into());
            }
        };

        let (sink, stream) = socket.split();
        let pending: PendingCommands = Arc::new(Mutex::new(HashMap::new()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(stream, pending.clone(), events_tx));

        tracing::debug!(target_url = %ws_url, "DevTools control channel open");

        Ok(Self {
            target_url: ws_url.to_string(),
            sink: Mutex::new(sink),
            pending,
            next_id: AtomicU64::new(1),
            responses: Some(events_rx),
            reader,
            command_timeout,
        })
    }

    /// WebSocket URL of the attached target
    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// Take the response feed; only the first call gets it
    pub(crate) fn take_responses(&mut self) -> Option<ResponseFeed> {
        self.responses.take()
    }

    /// Send a command and wait for its reply
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let frame = json!({ "id": id, "method": method, "params": params }).to_string();
        let sent = self.sink.lock().await.send(Message::Text(frame.into())).await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&id);
            return Err(command_error(method, e.to_string()));
        }

        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(message))) => Err(command_error(method, message)),
            Ok(Err(_)) => Err(command_error(method, "session closed before reply")),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(command_error(
                    method,
                    format!("no reply within {:?}", self.command_timeout),
                ))
            }
        }
    }

    /// Enable the network domain so response notifications start flowing
    pub async fn enable_network(&self) -> Result<()> {
        self.call("Network.enable", json!({})).await?;
        Ok(())
    }

    /// Navigate the controlled page to `url`
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let result = self.call("Page.navigate", json!({ "url": url })).await?;
        if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
            return Err(command_error("Page.navigate", error_text));
        }
        tracing::info!(url, "Navigated controlled page");
        Ok(())
    }

    /// Close the channel with a close frame
    pub async fn close(self) {
        let _ = self.sink.lock().await.close().await;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn command_error(method: &str, message: impl Into<String>) -> Error {
    Error::Command {
        method: method.to_string(),
        message: message.into(),
    }
}

async fn read_loop(
    mut stream: futures::stream::SplitStream<WsStream>,
    pending: PendingCommands,
    events_tx: mpsc::UnboundedSender<Result<ResponseEvent>>,
) {
    let reason = loop {
        let text = match stream.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(frame))) => {
                break match frame {
                    Some(frame) => format!(
                        "closed by browser: {} {}",
                        u16::from(frame.code),
                        frame.reason.as_str()
                    ),
                    None => "closed by browser".to_string(),
                };
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => break format!("websocket error: {e}"),
            None => break "websocket closed".to_string(),
        };

        let incoming: Incoming = match serde_json::from_str(&text) {
            Ok(incoming) => incoming,
            Err(e) => {
                tracing::trace!(error = %e, "Ignoring undecodable DevTools frame");
                continue;
            }
        };

        if let Some(id) = incoming.id {
            let reply = match incoming.error {
                Some(err) => Err(format!("{} (code {})", err.message, err.code)),
                None => Ok(incoming.result.unwrap_or(Value::Null)),
            };
            if let Some(tx) = pending.lock().await.remove(&id) {
                let _ = tx.send(reply);
            }
            continue;
        }

        if incoming.method.as_deref() == Some(RESPONSE_RECEIVED) {
            match incoming.params.pointer("/response/url").and_then(Value::as_str) {
                Some(url) => {
                    // receiver gone means nobody is listening any more
                    let _ = events_tx.send(Ok(ResponseEvent {
                        url: url.to_string(),
                    }));
                }
                None => tracing::debug!("responseReceived without response.url"),
            }
        }
    };

    tracing::warn!(reason = %reason, "DevTools control channel ended");
    let _ = events_tx.send(Err(Error::EventStream(reason)));
    pending.lock().await.clear();
}
