//! In-process DevTools WebSocket peers for unit tests.

use serde_json::{Value, json};
use std::future::Future;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{WebSocketStream, accept_async};

/// Accept one WebSocket connection and hand it to `handler`; returns its `ws://` URL
pub(crate) async fn spawn_ws_server<F, Fut>(handler: F) -> String
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        handler(ws).await;
    });
    format!("ws://{addr}/devtools/page/TEST")
}

/// `Network.responseReceived` notification for `url`
pub(crate) fn response_received(url: &str) -> Value {
    json!({
        "method": "Network.responseReceived",
        "params": {
            "requestId": "1000.1",
            "type": "Media",
            "response": { "url": url, "status": 206, "mimeType": "video/mp4" }
        }
    })
}

/// Empty successful reply to command `id`
pub(crate) fn reply_ok(id: u64) -> Value {
    json!({ "id": id, "result": {} })
}
