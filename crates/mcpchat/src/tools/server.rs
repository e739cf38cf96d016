use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::tool::Tool;

/// Raw output of one tool call as reported by the server
///
/// `content` is left as the server sent it: a single string, a structured value, or a
/// sequence of content fragments. Flattening it is the invoker's job.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: Value,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn new(content: Value) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn error(content: Value) -> Self {
        Self {
            content,
            is_error: true,
        }
    }
}

/// An external process that serves tools to the agent
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// Discover the tools currently offered
    async fn list_tools(&self) -> Result<Vec<Tool>>;

    /// Run a single tool call
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput>;

    /// Close the connection. Calling this more than once is a no-op.
    async fn disconnect(&self) -> Result<()>;
}
