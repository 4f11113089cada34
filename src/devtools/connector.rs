//! Session connector: discovery, control channel, retry.

use tokio_util::sync::CancellationToken;

use super::discovery::DevToolsHttp;
use super::session::Session;
use crate::config::{DevToolsConfig, RetryConfig};
use crate::error::{ConnectionError, Result};
use crate::retry::retry_with_backoff;

/// Establishes DevTools sessions against one endpoint
#[derive(Clone, Debug)]
pub struct Connector {
    http: DevToolsHttp,
    devtools: DevToolsConfig,
    retry: RetryConfig,
}

impl Connector {
    /// Create a connector for `devtools.endpoint` using `retry` between attempts
    pub fn new(devtools: DevToolsConfig, retry: RetryConfig) -> Result<Self> {
        let http = DevToolsHttp::new(&devtools.endpoint, devtools.connect_timeout)?;
        Ok(Self {
            http,
            devtools,
            retry,
        })
    }

    /// Run the connect sequence once: find or create a page target, open its channel
    pub async fn connect_once(&self) -> Result<Session> {
        let target = self.http.page_target().await?;
        let ws_url =
            target
                .web_socket_debugger_url
                .ok_or_else(|| ConnectionError::InvalidTarget {
                    endpoint: self.http.endpoint().to_string(),
                    reason: format!("target {} has no webSocketDebuggerUrl", target.id),
                })?;

        Session::open(
            &ws_url,
            self.devtools.connect_timeout,
            self.devtools.command_timeout,
        )
        .await
    }

    /// Connect, retrying the whole sequence on connection errors
    ///
    /// With the default retry policy this only returns once a session is up or
    /// `cancel` fires (`Error::Cancelled`).
    pub async fn connect(&self, cancel: &CancellationToken) -> Result<Session> {
        tracing::info!(
            endpoint = %self.http.endpoint(),
            "Connecting to DevTools endpoint (the browser must run with --remote-debugging-port)"
        );

        let session = retry_with_backoff(&self.retry, cancel, || self.connect_once()).await?;

        tracing::info!(target_url = %session.target_url(), "DevTools session established");
        Ok(session)
    }
}
