use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::base::Provider;
use super::configs::OpenAiProviderConfig;
use super::utils::{
    check_openai_context_length_error, handle_response, messages_to_openai_spec,
    openai_response_to_turn, tools_to_openai_spec, ArgumentsFormat, TurnEncoding,
};
use crate::errors::ProviderError;
use crate::models::message::{Message, ModelTurn};
use crate::models::tool::{Tool, ToolCall, ToolCallResult};

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );
        debug!(url = %url, "sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        handle_response(response).await
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "OpenAI"
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
            "messages": messages_to_openai_spec(messages, ArgumentsFormat::JsonString),
        });

        let tools_spec = self.format_tools(tools);
        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }

        let response = self.post(payload).await?;

        // Raise specific error if context length is exceeded
        if let Some(error) = response.get("error") {
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err);
            }
            return Err(ProviderError::Rejected {
                status: 200,
                message: error.to_string(),
            });
        }

        openai_response_to_turn(&response)
    }
}
