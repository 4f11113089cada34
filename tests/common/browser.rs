//! In-process stand-in for a remote-debuggable browser
//!
//! Serves `/json/list` through wiremock and speaks just enough CDP on a WebSocket to
//! drive the pipeline: every command gets an empty reply (or a navigation error when
//! asked), and scripted `Network.responseReceived` notifications are pushed once
//! `Network.enable` has been answered.

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Something the fake browser does on its own initiative
#[derive(Debug)]
pub enum BrowserAction {
    /// Push a `Network.responseReceived` notification for this URL
    Response(String),
    /// Close the control channel
    Close,
}

/// Fake DevTools endpoint with one attachable page
pub struct FakeBrowser {
    http: MockServer,
    actions: mpsc::UnboundedSender<BrowserAction>,
    commands: Arc<Mutex<Vec<Value>>>,
}

impl FakeBrowser {
    /// Start a browser that accepts navigation
    pub async fn start() -> Self {
        Self::start_with(None).await
    }

    /// Start a browser whose `Page.navigate` replies carry `error_text`
    pub async fn start_with(navigation_error: Option<&str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ws_url = format!("ws://{}/devtools/page/FAKE", listener.local_addr().unwrap());

        let (actions, mut pending) = mpsc::unbounded_channel::<BrowserAction>();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let navigation_error = navigation_error.map(str::to_string);

        let recorded = commands.clone();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let mut enabled = false;

            loop {
                tokio::select! {
                    incoming = ws.next() => {
                        let Some(Ok(Message::Text(text))) = incoming else { break };
                        let request: Value = serde_json::from_str(&text).unwrap();
                        let id = request["id"].as_u64().unwrap();
                        let method = request["method"].as_str().unwrap_or_default().to_string();
                        recorded.lock().unwrap().push(request);

                        let result = match (method.as_str(), &navigation_error) {
                            ("Page.navigate", Some(error)) => {
                                json!({ "frameId": "F1", "errorText": error })
                            }
                            ("Page.navigate", None) => json!({ "frameId": "F1" }),
                            _ => json!({}),
                        };
                        let reply = json!({ "id": id, "result": result });
                        if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                            break;
                        }
                        if method == "Network.enable" {
                            enabled = true;
                        }
                    }
                    action = pending.recv(), if enabled => match action {
                        Some(BrowserAction::Response(url)) => {
                            let event = json!({
                                "method": "Network.responseReceived",
                                "params": {
                                    "requestId": "1000.1",
                                    "type": "Media",
                                    "response": { "url": url, "status": 206 }
                                }
                            });
                            if ws.send(Message::Text(event.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                        Some(BrowserAction::Close) | None => {
                            let _ = ws.close(None).await;
                            break;
                        }
                    },
                }
            }
        });

        let http = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "BG", "type": "service_worker", "url": "chrome://sw" },
                {
                    "id": "FAKE", "type": "page", "url": "about:blank",
                    "webSocketDebuggerUrl": ws_url,
                },
            ])))
            .mount(&http)
            .await;

        Self {
            http,
            actions,
            commands,
        }
    }

    /// HTTP endpoint to put in `devtools.endpoint`
    pub fn endpoint(&self) -> String {
        self.http.uri()
    }

    /// Queue a response notification
    pub fn respond(&self, url: impl Into<String>) {
        let _ = self.actions.send(BrowserAction::Response(url.into()));
    }

    /// Close the control channel after the queued notifications
    pub fn close(&self) {
        let _ = self.actions.send(BrowserAction::Close);
    }

    /// Commands received so far, in order
    pub fn commands(&self) -> Vec<Value> {
        self.commands.lock().unwrap().clone()
    }
}
