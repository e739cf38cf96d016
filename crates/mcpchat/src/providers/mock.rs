use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use super::utils::{tools_to_openai_spec, TurnEncoding};
use crate::errors::ProviderError;
use crate::models::message::{Message, ModelTurn};
use crate::models::tool::{Tool, ToolCall, ToolCallResult};
use crate::providers::base::Provider;

/// A mock provider that returns pre-configured turns for testing
///
/// Once the script runs out the fallback turn is repeated, or an empty text turn if none
/// was set. Every history it receives is recorded for later inspection, and clones
/// share both the script and the recording.
#[derive(Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Result<ModelTurn, ProviderError>>>>,
    fallback: Option<ModelTurn>,
    encoding: TurnEncoding,
    histories: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Result<ModelTurn, ProviderError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            fallback: None,
            encoding: TurnEncoding::Correlated,
            histories: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_fallback(mut self, turn: ModelTurn) -> Self {
        self.fallback = Some(turn);
        self
    }

    pub fn with_encoding(mut self, encoding: TurnEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn call_count(&self) -> usize {
        self.histories.lock().unwrap().len()
    }

    pub fn histories(&self) -> Vec<Vec<Message>> {
        self.histories.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "Mock"
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn format_tools(&self, tools: &[Tool]) -> Vec<Value> {
        tools_to_openai_spec(tools)
    }

    fn encode_assistant_turn(&self, turn: &ModelTurn) -> Message {
        self.encoding.assistant_turn(turn)
    }

    fn encode_tool_result(&self, call: &ToolCall, result: &ToolCallResult) -> Message {
        self.encoding.tool_result(call, result)
    }

    async fn generate_turn(
        &self,
        messages: &[Message],
        _tools: &[Tool],
    ) -> Result<ModelTurn, ProviderError> {
        self.histories.lock().unwrap().push(messages.to_vec());

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self
                .fallback
                .clone()
                .unwrap_or_else(|| ModelTurn::text("")))
        } else {
            responses.remove(0)
        }
    }
}
