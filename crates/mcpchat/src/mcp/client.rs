use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::http::HttpTransport;
use super::transport::{McpTransport, StdioTransport};
use super::types::{
    InitializeParams, InitializeResult, ToolsCallParams, ToolsCallResult, ToolsListResult,
};
use crate::models::tool::Tool;
use crate::tools::server::{ToolOutput, ToolServer};

/// How to reach a tool server given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerTarget {
    Http(String),
    Process { command: String, args: Vec<String> },
}

impl ServerTarget {
    /// Pick the transport and launcher from the target's shape
    pub fn parse(target: &str) -> Result<Self> {
        if let Ok(url) = Url::parse(target) {
            if matches!(url.scheme(), "http" | "https") {
                return Ok(ServerTarget::Http(target.to_string()));
            }
        }

        let extension = Path::new(target)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        let command = match extension {
            "py" if cfg!(windows) => "python",
            "py" => "python3",
            "js" => "node",
            _ => bail!("Server script must be a .js or .py file, or an HTTP URL"),
        };

        Ok(ServerTarget::Process {
            command: command.to_string(),
            args: vec![target.to_string()],
        })
    }
}

/// A connection to one MCP tool server
pub struct McpClient {
    transport: Arc<dyn McpTransport>,
    server_info: InitializeResult,
    closed: AtomicBool,
}

impl McpClient {
    /// Connect to a server script or url and complete the handshake
    pub async fn connect(target: &str) -> Result<Self> {
        let transport: Arc<dyn McpTransport> = match ServerTarget::parse(target)? {
            ServerTarget::Http(url) => {
                info!(url = %url, "connecting to tool server over http");
                HttpTransport::new(&url)?
            }
            ServerTarget::Process { command, args } => StdioTransport::spawn(&command, &args).await?,
        };

        match Self::initialize(transport.clone()).await {
            Ok(client) => Ok(client),
            Err(e) => {
                warn!(server = %target, error = %e, "tool server handshake failed");
                transport.close().await;
                Err(e)
            }
        }
    }

    /// Run the `initialize` handshake over an already open transport
    pub async fn initialize(transport: Arc<dyn McpTransport>) -> Result<Self> {
        let params = serde_json::to_value(InitializeParams::default())?;
        let response = transport
            .request("initialize", Some(params))
            .await
            .context("initialize request failed")?;

        let server_info: InitializeResult =
            serde_json::from_value(response.result.context("initialize returned no result")?)
                .context("failed to parse initialize result")?;

        info!(
            server = %server_info.server_info.name,
            protocol = %server_info.protocol_version,
            "tool server initialized"
        );

        transport.notify("notifications/initialized", None).await?;

        Ok(Self {
            transport,
            server_info,
            closed: AtomicBool::new(false),
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server_info.server_info.name
    }

    pub fn server_info(&self) -> &InitializeResult {
        &self.server_info
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            bail!("not connected to tool server '{}'", self.server_name());
        }
        Ok(())
    }
}

#[async_trait]
impl ToolServer for McpClient {
    async fn list_tools(&self) -> Result<Vec<Tool>> {
        self.ensure_open()?;

        let response = self.transport.request("tools/list", None).await?;
        let result: ToolsListResult =
            serde_json::from_value(response.result.context("tools/list returned no result")?)
                .context("failed to parse tools/list result")?;

        debug!(count = result.tools.len(), "listed tools");
        Ok(result.tools.into_iter().map(Tool::from).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput> {
        self.ensure_open()?;

        let params = ToolsCallParams {
            name: name.to_string(),
            arguments,
        };
        let response = self
            .transport
            .request("tools/call", Some(serde_json::to_value(&params)?))
            .await?;
        let result: ToolsCallResult =
            serde_json::from_value(response.result.context("tools/call returned no result")?)
                .context("failed to parse tools/call result")?;

        Ok(ToolOutput {
            content: result.content,
            is_error: result.is_error,
        })
    }

    async fn disconnect(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(server = %self.server_name(), "disconnecting from tool server");
            self.transport.close().await;
        }
        Ok(())
    }
}
