use std::collections::HashSet;

use tracing::debug;

use super::server::ToolServer;
use crate::errors::{ToolError, ToolResult};
use crate::models::tool::Tool;

/// The tools a server offered at connect time
///
/// Read-only once built. A change in what the server offers needs a fresh discovery.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Tool>) -> ToolResult<Self> {
        let mut seen = HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(ToolError::DuplicateTool(tool.name.clone()));
            }
        }
        Ok(Self { tools })
    }

    /// Ask the server for its tools, once
    pub async fn discover(server: &dyn ToolServer) -> ToolResult<Self> {
        let tools = server
            .list_tools()
            .await
            .map_err(|e| ToolError::Transport(format!("{:#}", e)))?;
        debug!(count = tools.len(), "discovered tools");
        Self::new(tools)
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
