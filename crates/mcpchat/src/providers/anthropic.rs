use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::base::Provider;
use super::configs::AnthropicProviderConfig;
use super::utils::{handle_response, TurnEncoding, EMPTY_TOOL_RESULT};
use crate::errors::ProviderError;
use crate::models::message::{Message, ModelTurn};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall, ToolCallResult};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: i32 = 2000;

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    /// Split the history into the top level system prompt and the message list
    ///
    /// Messages with empty text are left out of the payload since the api rejects empty
    /// content blocks, and tool messages can only be sent as user text here.
    fn messages_to_anthropic_spec(messages: &[Message]) -> (Option<String>, Vec<Value>) {
        let mut system = Vec::new();
        let mut anthropic_messages = Vec::new();

        for message in messages {
            if message.content.is_empty() {
                continue;
            }

            let role = match message.role {
                Role::System => {
                    system.push(message.content.as_str());
                    continue;
                }
                Role::Assistant => "assistant",
                Role::User | Role::Tool => "user",
            };

            anthropic_messages.push(json!({
                "role": role,
                "content": message.content
            }));
        }

        let system = (!system.is_empty()).then(|| system.join("\n\n"));
        (system, anthropic_messages)
    }

    fn response_to_turn(response: &Value) -> Result<ModelTurn, ProviderError> {
        let blocks = response
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ProviderError::Malformed("Invalid response format from Anthropic API".into())
            })?;

        let mut text = String::new();
        let mut turn = ModelTurn::default();
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(segment) = block.get("text").and_then(Value::as_str) {
                        text.push_str(segment);
                    }
                }
                Some("tool_use") => {
                    let id = block.get("id").and_then(Value::as_str).ok_or_else(|| {
                        ProviderError::Malformed("tool_use block without an id".into())
                    })?;
                    let name = block.get("name").and_then(Value::as_str).ok_or_else(|| {
                        ProviderError::Malformed(format!("tool_use block {} without a name", id))
                    })?;
                    let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                    turn = turn.with_tool_call(ToolCall::new(id, name, input));
                }
                _ => {} // thinking and other block types carry nothing for the loop
            }
        }

        Ok(turn.with_text(text))
    }

    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));
        debug!(url = %url, "sending messages request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await?;

        handle_response(response).await
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "Claude"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn format_tools(&self, tools: &[Tool]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema,
                })
            })
            .collect()
    }

    fn encode_assistant_turn(&self, turn: &ModelTurn) -> Message {
        TurnEncoding::UserRole.assistant_turn(turn)
    }

    fn encode_tool_result(&self, call: &ToolCall, result: &ToolCallResult) -> Message {
        TurnEncoding::UserRole.tool_result(call, result)
    }

    async fn generate_turn(
        &self,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ModelTurn, ProviderError> {
        let (system, anthropic_messages) = Self::messages_to_anthropic_spec(messages);

        let mut payload = json!({
            "model": self.config.model,
            "messages": anthropic_messages,
            "max_tokens": self.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });

        if let Some(system) = system {
            payload["system"] = json!(system);
        }
        let tools_spec = self.format_tools(tools);
        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }

        let response = self.post(payload).await?;

        if response.get("type").and_then(Value::as_str) == Some("error") {
            return Err(ProviderError::Rejected {
                status: 200,
                message: response["error"].to_string(),
            });
        }

        Self::response_to_turn(&response)
    }
}
