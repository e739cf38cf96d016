use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::transport::{request_deadline, McpTransport, REQUEST_TIMEOUT};
use super::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};

const SESSION_ID_HEADER: &str = "Mcp-Session-Id";
const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";
const STREAMABLE_ACCEPT: &str = "application/json, text/event-stream";

/// Streamable HTTP transport for remote tool servers
///
/// Every message is a POST to the server url. Answers come back either as plain json or
/// as a short event stream carrying the response, and a session id handed out by the
/// server is sent back on every later request.
pub struct HttpTransport {
    client: Client,
    url: String,
    next_id: AtomicU64,
    session_id: RwLock<Option<String>>,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(url: &str) -> Result<Arc<Self>> {
        Self::with_timeout(url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(url: &str, request_timeout: Duration) -> Result<Arc<Self>> {
        let client = Client::builder()
            .build()
            .context("failed to build http client")?;

        Ok(Arc::new(Self {
            client,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
            session_id: RwLock::new(None),
            request_timeout,
        }))
    }

    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    async fn post<T: Serialize + ?Sized>(&self, method: &str, body: &T) -> Result<Response> {
        let mut request = self
            .client
            .post(&self.url)
            .header(header::ACCEPT, STREAMABLE_ACCEPT)
            .header(PROTOCOL_VERSION_HEADER, PROTOCOL_VERSION)
            .json(body);
        if let Some(deadline) = request_deadline(method, self.request_timeout) {
            request = request.timeout(deadline);
        }
        if let Some(session_id) = self.session_id().await {
            request = request.header(SESSION_ID_HEADER, session_id);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("POST to '{}' for '{}' failed", self.url, method))?;

        if let Some(session_id) = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
        {
            let mut slot = self.session_id.write().await;
            if slot.as_deref() != Some(session_id) {
                debug!(session_id = %session_id, "updated tool server session id");
                *slot = Some(session_id.to_string());
            }
        }

        Ok(response)
    }
}

fn is_event_stream(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|base| base.trim() == "text/event-stream")
}

/// Pull the first JSON-RPC response out of an event stream body
fn parse_event_stream(body: &str) -> Option<JsonRpcResponse> {
    let mut data = String::new();
    for line in body.lines().chain(std::iter::once("")) {
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.trim_start());
        } else if line.is_empty() && !data.is_empty() {
            if let Ok(response) = serde_json::from_str::<JsonRpcResponse>(&data) {
                return Some(response);
            }
            data.clear();
        }
    }
    None
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        debug!(method = %method, id = id, url = %self.url, "client -> tool server");

        let response = self.post(method, &request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("tool server returned HTTP {} for '{}': {}", status, method, body);
        }

        let response: JsonRpcResponse = if is_event_stream(&response) {
            let body = response
                .text()
                .await
                .with_context(|| format!("failed to read event stream for '{}'", method))?;
            parse_event_stream(&body)
                .ok_or_else(|| anyhow!("no JSON-RPC response in event stream for '{}'", method))?
        } else {
            response
                .json()
                .await
                .with_context(|| format!("failed to parse JSON-RPC response for '{}'", method))?
        };

        if let Some(err) = &response.error {
            bail!("error on '{}': code={} message={}", method, err.code, err.message);
        }
        Ok(response)
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = JsonRpcNotification::new(method, params);
        let response = self.post(method, &notification).await?;
        if !response.status().is_success() {
            warn!(method = %method, status = %response.status(), "notification was not accepted");
        }
        Ok(())
    }

    async fn close(&self) {
        let Some(session_id) = self.session_id.write().await.take() else {
            return;
        };

        let result = self
            .client
            .delete(&self.url)
            .timeout(Duration::from_secs(5))
            .header(SESSION_ID_HEADER, session_id)
            .send()
            .await;
        if let Err(e) = result {
            debug!(error = %e, "failed to end tool server session");
        }
    }
}
