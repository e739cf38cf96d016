use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline a transport puts on a request
///
/// Tool calls get none, they are bounded by the invoker's own timeout instead.
pub fn request_deadline(method: &str, timeout: Duration) -> Option<Duration> {
    (method != "tools/call").then_some(timeout)
}

/// A JSON-RPC channel to an MCP server
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a request and wait for its response. JSON-RPC errors are returned as `Err`.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse>;

    /// Send a notification, no response expected
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()>;

    /// Tear down the connection
    async fn close(&self);
}

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<JsonRpcResponse>>>>;

/// Talks newline-delimited JSON-RPC over the stdio of a child process
pub struct StdioTransport {
    child: Mutex<Option<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    pending: Pending,
    next_id: AtomicU64,
    reader: Mutex<Option<JoinHandle<()>>>,
    request_timeout: Duration,
}

impl StdioTransport {
    /// Spawn the server process and start reading its output
    pub async fn spawn(command: &str, args: &[String]) -> Result<Arc<Self>> {
        Self::spawn_with_timeout(command, args, REQUEST_TIMEOUT).await
    }

    pub async fn spawn_with_timeout(
        command: &str,
        args: &[String],
        request_timeout: Duration,
    ) -> Result<Arc<Self>> {
        info!(command = %command, args = ?args, "spawning tool server");

        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn tool server: {}", command))?;

        let stdin = child.stdin.take().context("failed to capture stdin")?;
        let stdout = child.stdout.take().context("failed to capture stdout")?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let line = line.trim();
                    if !line.is_empty() {
                        warn!(stderr = %line, "tool server stderr");
                    }
                }
            });
        }

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let reader = tokio::spawn(read_responses(stdout, Arc::clone(&pending)));

        Ok(Arc::new(Self {
            child: Mutex::new(Some(child)),
            stdin: Mutex::new(Some(stdin)),
            pending,
            next_id: AtomicU64::new(1),
            reader: Mutex::new(Some(reader)),
            request_timeout,
        }))
    }

    async fn write_line(&self, payload: String) -> Result<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| anyhow!("tool server connection is closed"))?;
        stdin.write_all(payload.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }
}

async fn read_responses(stdout: tokio::process::ChildStdout, pending: Pending) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                trace!(raw = %line, "tool server -> client");

                match serde_json::from_str::<JsonRpcResponse>(line) {
                    Ok(response) => {
                        let key = response.id.to_string();
                        match pending.lock().await.remove(&key) {
                            Some(tx) => {
                                let _ = tx.send(response);
                            }
                            None => warn!(id = %key, "response for unknown request id"),
                        }
                    }
                    Err(e) => debug!(error = %e, line = %line, "ignoring non-response line"),
                }
            }
            Ok(None) => {
                debug!("tool server stdout closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "failed reading tool server stdout");
                break;
            }
        }
    }
    // wake anyone still waiting
    pending.lock().await.clear();
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        let key = request.id.to_string();

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(key.clone(), tx);

        debug!(method = %method, id = id, "client -> tool server");
        if let Err(e) = self.write_line(serde_json::to_string(&request)?).await {
            self.pending.lock().await.remove(&key);
            return Err(e.context(format!("failed to send '{}'", method)));
        }

        let received = match request_deadline(method, self.request_timeout) {
            Some(deadline) => match tokio::time::timeout(deadline, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending.lock().await.remove(&key);
                    bail!(
                        "request '{}' timed out after {}ms",
                        method,
                        deadline.as_millis()
                    )
                }
            },
            None => rx.await,
        };
        let Ok(response) = received else {
            bail!("tool server closed before answering '{}'", method);
        };

        if let Some(err) = &response.error {
            bail!("error on '{}': code={} message={}", method, err.code, err.message);
        }
        Ok(response)
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        trace!(method = %method, "client -> tool server (notification)");
        let notification = JsonRpcNotification::new(method, params);
        self.write_line(serde_json::to_string(&notification)?).await
    }

    async fn close(&self) {
        self.stdin.lock().await.take();
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                debug!(error = %e, "tool server already exited");
            }
        }
        self.pending.lock().await.clear();
    }
}
