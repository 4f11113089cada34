//! Target discovery over the DevTools HTTP/JSON API.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ConnectionError, Result};

/// A debuggable target as listed by `/json/list`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    /// Target identifier
    pub id: String,
    /// Target kind ("page", "service_worker", "iframe", ...)
    #[serde(rename = "type")]
    pub target_type: String,
    /// URL currently loaded in the target
    #[serde(default)]
    pub url: String,
    /// Control channel address; absent when another client is already attached
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub web_socket_debugger_url: Option<String>,
}

impl TargetInfo {
    /// Whether this is a page we can attach to
    pub fn is_attachable_page(&self) -> bool {
        self.target_type == "page" && self.web_socket_debugger_url.is_some()
    }
}

/// Client for the browser's remote debugging HTTP endpoint
#[derive(Clone, Debug)]
pub struct DevToolsHttp {
    endpoint: String,
    client: reqwest::Client,
}

impl DevToolsHttp {
    /// Create a client for `endpoint` (e.g. `http://127.0.0.1:9222`)
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ConnectionError::Discovery {
                endpoint: endpoint.clone(),
                source,
            })?;
        Ok(Self { endpoint, client })
    }

    /// The endpoint this client talks to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// List all debuggable targets
    pub async fn list_targets(&self) -> Result<Vec<TargetInfo>> {
        let response = self
            .client
            .get(format!("{}/json/list", self.endpoint))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| self.discovery_error(source))?;

        let targets = response
            .json::<Vec<TargetInfo>>()
            .await
            .map_err(|e| self.invalid_target(format!("undecodable target list: {e}")))?;
        Ok(targets)
    }

    /// Open a new page target
    ///
    /// Recent Chrome versions only accept `PUT` on `/json/new`.
    pub async fn create_target(&self) -> Result<TargetInfo> {
        let response = self
            .client
            .put(format!("{}/json/new", self.endpoint))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| self.discovery_error(source))?;

        let target = response
            .json::<TargetInfo>()
            .await
            .map_err(|e| self.invalid_target(format!("undecodable new target: {e}")))?;
        Ok(target)
    }

    /// Return the first attachable page, creating one if there is none
    pub async fn page_target(&self) -> Result<TargetInfo> {
        let targets = self.list_targets().await?;
        if let Some(target) = targets.into_iter().find(TargetInfo::is_attachable_page) {
            tracing::debug!(target_id = %target.id, url = %target.url, "Using existing page target");
            return Ok(target);
        }

        tracing::info!(endpoint = %self.endpoint, "No attachable page target, creating one");
        let target = self.create_target().await?;
        if target.web_socket_debugger_url.is_none() {
            return Err(self
                .invalid_target(format!(
                    "created target {} has no webSocketDebuggerUrl",
                    target.id
                ))
                .into());
        }
        Ok(target)
    }

    fn discovery_error(&self, source: reqwest::Error) -> ConnectionError {
        ConnectionError::Discovery {
            endpoint: self.endpoint.clone(),
            source,
        }
    }

    fn invalid_target(&self, reason: String) -> ConnectionError {
        ConnectionError::InvalidTarget {
            endpoint: self.endpoint.clone(),
            reason,
        }
    }
}
