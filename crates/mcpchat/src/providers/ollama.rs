use super::base::Provider;
use super::configs::OllamaProviderConfig;
use super::utils::{
    handle_response, messages_to_openai_spec, openai_message_to_turn, tools_to_openai_spec,
    ArgumentsFormat, TurnEncoding,
};
use crate::errors::ProviderError;
use crate::models::message::{Message, ModelTurn};
use crate::models::tool::{Tool, ToolCall, ToolCallResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const OLLAMA_MODEL: &str = "qwen2.5";

pub struct OllamaProvider {
    client: Client,
    config: OllamaProviderConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaProviderConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn options(&self) -> Option<Value> {
        let mut options = serde_json::Map::new();
        if let Some(temp) = self.config.temperature {
            options.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = self.config.max_tokens {
            options.insert("num_predict".to_string(), json!(tokens));
        }
        (!options.is_empty()).then_some(Value::Object(options))
    }

    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let url = format!("{}/api/chat", self.config.host.trim_end_matches('/'));
        debug!(url = %url, "sending chat request");

        let response = self.client.post(&url).json(&payload).send().await?;

        handle_response(response).await
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "Ollama"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn format_tools(&self, tools: &[Tool]) -> Vec<Value> {
        tools_to_openai_spec(tools)
    }

    fn encode_assistant_turn(&self, turn: &ModelTurn) -> Message {
        TurnEncoding::Correlated.assistant_turn(turn)
    }

    fn encode_tool_result(&self, call: &ToolCall, result: &ToolCallResult) -> Message {
        TurnEncoding::Correlated.tool_result(call, result)
    }

    async fn generate_turn(
        &self,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ModelTurn, ProviderError> {
        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_to_openai_spec(messages, ArgumentsFormat::Object),
            "stream": false,
        });

        let tools_spec = self.format_tools(tools);
        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }
        if let Some(options) = self.options() {
            payload["options"] = options;
        }

        let response = self.post(payload).await?;

        if let Some(error) = response.get("error") {
            return Err(ProviderError::Rejected {
                status: 200,
                message: error.as_str().map(String::from).unwrap_or_else(|| error.to_string()),
            });
        }

        let message = response
            .get("message")
            .ok_or_else(|| ProviderError::Malformed("response has no message".into()))?;
        openai_message_to_turn(message)
    }
}
