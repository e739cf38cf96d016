use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ProviderError;
use crate::models::message::{Message, ModelTurn};
use crate::models::tool::{Tool, ToolCall, ToolCallResult};

/// Base trait for AI providers (OpenAI, Anthropic, Ollama)
///
/// A provider is chosen once when the agent is built. Besides talking to the backend
/// it owns the rules for how turns are written back into history, since each backend
/// family expects tool calls and tool results to be correlated differently.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human readable provider name
    fn name(&self) -> &str;

    /// The model requested from the backend
    fn model(&self) -> &str;

    /// Encode the tools in the envelope this provider expects
    ///
    /// An empty tool set yields an empty vector, which the provider takes to mean
    /// that no tools are offered at all.
    fn format_tools(&self, tools: &[Tool]) -> Vec<Value>;

    /// Re-encode an assistant turn for appending to history
    fn encode_assistant_turn(&self, turn: &ModelTurn) -> Message;

    /// Encode the result of a tool call for appending to history
    fn encode_tool_result(&self, call: &ToolCall, result: &ToolCallResult) -> Message;

    /// Send the full history and the tool set to the backend and wait for the next turn
    async fn generate_turn(
        &self,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ModelTurn, ProviderError>;
}
