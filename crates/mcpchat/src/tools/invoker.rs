use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use super::server::{ToolOutput, ToolServer};
use crate::errors::ToolError;
use crate::models::tool::{ToolCall, ToolCallResult};

const LOG_PREVIEW_CHARS: usize = 200;

/// Runs tool calls against a server one at a time
///
/// Failures never leave the invoker. A transport error, a timeout or a protocol error
/// comes back as a [`ToolCallResult`] flagged as an error so the model gets to see it.
#[derive(Clone)]
pub struct ToolInvoker {
    server: Arc<dyn ToolServer>,
    timeout: Option<Duration>,
}

impl ToolInvoker {
    pub fn new(server: Arc<dyn ToolServer>) -> Self {
        Self {
            server,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn invoke(&self, call: &ToolCall) -> ToolCallResult {
        info!(tool = %call.name, arguments = %call.arguments, "calling tool");

        let result = match self.call(call).await {
            Ok(output) if output.is_error => ToolCallResult::error(flatten_content(&output.content)),
            Ok(output) => ToolCallResult::success(flatten_content(&output.content)),
            Err(e) => ToolCallResult::error(format!("Error executing {}: {}", call.name, e)),
        };

        if result.is_error {
            warn!(tool = %call.name, result = %preview(&result.content), "tool call failed");
        } else {
            info!(tool = %call.name, result = %preview(&result.content), "tool call finished");
        }
        result
    }

    async fn call(&self, call: &ToolCall) -> Result<ToolOutput, ToolError> {
        let request = self.server.call_tool(&call.name, call.arguments.clone());
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| ToolError::Timeout {
                    secs: limit.as_secs(),
                })?,
            None => request.await,
        };
        outcome.map_err(|e| ToolError::Transport(format!("{:#}", e)))
    }
}

/// Flatten whatever the server sent back into a single string
///
/// Strings pass through, sequences are joined line by line with non-string entries
/// serialized, anything else is serialized whole.
pub fn flatten_content(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > LOG_PREVIEW_CHARS {
        let head: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
