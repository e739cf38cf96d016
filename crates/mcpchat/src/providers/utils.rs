use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;

use crate::errors::ProviderError;
use crate::models::message::{Message, ModelTurn};
use crate::models::tool::{Tool, ToolCall, ToolCallResult};

/// How a provider family expects turns to be written back into history
///
/// `Correlated` backends (openai style completions, ollama) need the assistant message to
/// carry the tool calls it emitted, and answer each with a tool-role message referencing
/// the call id. `UserRole` backends (anthropic messages) get bare assistant text and the
/// tool results as plain user messages, relying on ordering alone.
/// Sent in place of an empty tool result when results travel as plain user text,
/// where an empty message would be dropped
pub const EMPTY_TOOL_RESULT: &str = "(tool returned no output)";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TurnEncoding {
    Correlated,
    UserRole,
}

impl TurnEncoding {
    pub fn assistant_turn(self, turn: &ModelTurn) -> Message {
        let message = Message::assistant().with_text(turn.text_content().unwrap_or_default());
        match self {
            TurnEncoding::Correlated => message.with_tool_calls(turn.tool_calls.iter().cloned()),
            TurnEncoding::UserRole => message,
        }
    }

    pub fn tool_result(self, call: &ToolCall, result: &ToolCallResult) -> Message {
        match self {
            TurnEncoding::Correlated => Message::tool(&call.id).with_text(&result.content),
            TurnEncoding::UserRole if result.content.is_empty() => {
                Message::user().with_text(EMPTY_TOOL_RESULT)
            }
            TurnEncoding::UserRole => Message::user().with_text(&result.content),
        }
    }
}

/// How tool call arguments are written on the wire
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArgumentsFormat {
    /// Serialized into a json string, as openai expects
    JsonString,
    /// Passed through as a json object, as ollama expects
    Object,
}

impl ArgumentsFormat {
    fn encode(self, arguments: &Value) -> Value {
        match self {
            ArgumentsFormat::JsonString => Value::String(arguments.to_string()),
            ArgumentsFormat::Object => arguments.clone(),
        }
    }
}

/// Convert the history to openai style chat messages
pub fn messages_to_openai_spec(messages: &[Message], format: ArgumentsFormat) -> Vec<Value> {
    messages
        .iter()
        .map(|message| {
            let mut converted = json!({
                "role": message.role,
                "content": message.content,
            });

            if message.has_tool_calls() {
                let tool_calls: Vec<Value> = message
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": format.encode(&call.arguments),
                            }
                        })
                    })
                    .collect();
                converted["tool_calls"] = Value::Array(tool_calls);
            }

            if let Some(id) = &message.tool_call_id {
                converted["tool_call_id"] = json!(id);
            }

            converted
        })
        .collect()
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema,
                }
            })
        })
        .collect()
}

/// Convert an openai style message object (`choices[0].message` or ollama's `message`)
/// into a model turn. Tool calls without an id get a sequential one.
pub fn openai_message_to_turn(message: &Value) -> Result<ModelTurn, ProviderError> {
    let mut turn = ModelTurn::default().with_text(collect_text(message.get("content")));

    if let Some(tool_calls) = message.get("tool_calls").and_then(Value::as_array) {
        for (index, tool_call) in tool_calls.iter().enumerate() {
            let id = tool_call
                .get("id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .unwrap_or_else(|| synthesize_call_id(index));

            let function = tool_call.get("function").ok_or_else(|| {
                ProviderError::Malformed(format!("tool call {} has no function", id))
            })?;
            let name = function
                .get("name")
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| {
                    ProviderError::Malformed(format!("tool call {} has no function name", id))
                })?;
            let arguments = parse_tool_arguments(&id, function.get("arguments"))?;

            turn = turn.with_tool_call(ToolCall::new(id, name, arguments));
        }
    }

    Ok(turn)
}

/// Convert OpenAI's chat completion response to a model turn
pub fn openai_response_to_turn(response: &Value) -> Result<ModelTurn, ProviderError> {
    let message = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| ProviderError::Malformed("response has no choices[0].message".into()))?;

    openai_message_to_turn(message)
}

/// Per-turn sequential id for backends that do not assign tool call ids
pub fn synthesize_call_id(index: usize) -> String {
    format!("call_{}", index)
}

/// Tool arguments arrive either as a json encoded string or as a json value
fn parse_tool_arguments(id: &str, arguments: Option<&Value>) -> Result<Value, ProviderError> {
    match arguments {
        None | Some(Value::Null) => Ok(json!({})),
        Some(Value::String(raw)) if raw.trim().is_empty() => Ok(json!({})),
        Some(Value::String(raw)) => serde_json::from_str(raw).map_err(|e| {
            ProviderError::Malformed(format!(
                "Could not interpret tool use parameters for id {}: {}",
                id, e
            ))
        }),
        Some(value) => Ok(value.clone()),
    }
}

/// Message content is either a string or a list of typed parts, text parts are joined in order
fn collect_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter(|part| part.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect(),
        _ => String::new(),
    }
}

/// Map an http response onto the shared provider error taxonomy
pub async fn handle_response(response: reqwest::Response) -> Result<Value, ProviderError> {
    let status = response.status();
    debug!(status = %status, "provider responded");

    match status {
        status if status.is_success() => Ok(response.json().await?),
        status if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() => {
            Err(ProviderError::ServerError {
                status: status.as_u16(),
            })
        }
        status => {
            let message = response.text().await.unwrap_or_default();
            Err(ProviderError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

pub fn check_openai_context_length_error(error: &Value) -> Option<ProviderError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ProviderError::ContextLengthExceeded(message))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::Role;

    const OPENAI_TOOL_USE_RESPONSE: &str = r#"{
        "choices": [{
            "role": "assistant",
            "message": {
                "tool_calls": [{
                    "id": "1",
                    "function": {
                        "name": "example_fn",
                        "arguments": "{\"param\": {\"nested\": [1, 2]}}"
                    }
                }]
            }
        }]
    }"#;

    #[test]
    fn test_messages_to_openai_spec() {
        let message = Message::user().with_text("Hello");
        let spec = messages_to_openai_spec(&[message], ArgumentsFormat::JsonString);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[0]["content"], "Hello");
        assert!(spec[0].get("tool_calls").is_none());
        assert!(spec[0].get("tool_call_id").is_none());
    }

    #[test]
    fn test_messages_to_openai_spec_complex() {
        let call = ToolCall::new("call_9", "example", json!({"param1": "value1"}));
        let turn = ModelTurn::default().with_tool_call(call.clone());
        let messages = vec![
            Message::user().with_text("How are you?"),
            TurnEncoding::Correlated.assistant_turn(&turn),
            TurnEncoding::Correlated.tool_result(&call, &ToolCallResult::success("Result")),
        ];

        let spec = messages_to_openai_spec(&messages, ArgumentsFormat::JsonString);

        assert_eq!(spec.len(), 3);
        assert_eq!(spec[1]["role"], "assistant");
        assert_eq!(spec[1]["content"], "");
        assert_eq!(
            spec[1]["tool_calls"][0]["function"]["arguments"],
            json!("{\"param1\":\"value1\"}")
        );
        assert_eq!(spec[2]["role"], "tool");
        assert_eq!(spec[2]["content"], "Result");
        assert_eq!(spec[2]["tool_call_id"], spec[1]["tool_calls"][0]["id"]);
    }

    #[test]
    fn test_messages_to_spec_with_object_arguments() {
        let call = ToolCall::new("call_0", "example", json!({"param1": "value1"}));
        let turn = ModelTurn::default().with_tool_call(call);
        let messages = vec![TurnEncoding::Correlated.assistant_turn(&turn)];

        let spec = messages_to_openai_spec(&messages, ArgumentsFormat::Object);
        assert_eq!(
            spec[0]["tool_calls"][0]["function"]["arguments"],
            json!({"param1": "value1"})
        );
    }

    #[test]
    fn test_user_role_encoding_never_correlates() {
        let call = ToolCall::new("toolu_1", "example", json!({}));
        let turn = ModelTurn::text("Let me check").with_tool_call(call.clone());

        let assistant = TurnEncoding::UserRole.assistant_turn(&turn);
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.content, "Let me check");
        assert!(assistant.tool_calls.is_empty());

        let result = TurnEncoding::UserRole.tool_result(&call, &ToolCallResult::error("boom"));
        assert_eq!(result.role, Role::User);
        assert_eq!(result.content, "boom");
        assert_eq!(result.tool_call_id, None);

        let empty = TurnEncoding::UserRole.tool_result(&call, &ToolCallResult::success(""));
        assert_eq!(empty.role, Role::User);
        assert_eq!(empty.content, EMPTY_TOOL_RESULT);

        // correlated results keep the exact content
        let empty = TurnEncoding::Correlated.tool_result(&call, &ToolCallResult::success(""));
        assert_eq!(empty.content, "");
    }

    #[test]
    fn test_tools_to_openai_spec() {
        let tool = Tool::new(
            "test_tool",
            "A test tool",
            json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "Test parameter"
                    }
                },
                "required": ["input"]
            }),
        );

        let spec = tools_to_openai_spec(&[tool]);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["type"], "function");
        assert_eq!(spec[0]["function"]["name"], "test_tool");
        assert_eq!(spec[0]["function"]["parameters"]["required"], json!(["input"]));
    }

    #[test]
    fn test_tools_to_openai_spec_empty() {
        assert!(tools_to_openai_spec(&[]).is_empty());
    }

    #[test]
    fn test_openai_response_to_turn_text() -> Result<(), ProviderError> {
        let response = json!({
            "choices": [{
                "message": {
                    "content": "Hello from John Cena!"
                }
            }]
        });

        let turn = openai_response_to_turn(&response)?;
        assert_eq!(turn.text_content(), Some("Hello from John Cena!"));
        assert!(!turn.has_tool_calls());
        Ok(())
    }

    #[test]
    fn test_openai_response_to_turn_valid_tool_call() -> Result<(), ProviderError> {
        let response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE).unwrap();
        let turn = openai_response_to_turn(&response)?;

        assert_eq!(turn.content, None);
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].id, "1");
        assert_eq!(turn.tool_calls[0].name, "example_fn");
        assert_eq!(
            turn.tool_calls[0].arguments,
            json!({"param": {"nested": [1, 2]}})
        );
        Ok(())
    }

    #[test]
    fn test_openai_response_to_turn_json_decode_error() {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE).unwrap();
        response["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"] =
            json!("invalid json {");

        match openai_response_to_turn(&response) {
            Err(ProviderError::Malformed(msg)) => {
                assert!(msg.starts_with("Could not interpret tool use parameters"))
            }
            other => panic!("Expected Malformed error, got {:?}", other),
        }
    }

    #[test]
    fn test_openai_response_empty_arguments_are_an_empty_object() -> Result<(), ProviderError> {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE).unwrap();
        response["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"] = json!("");

        let turn = openai_response_to_turn(&response)?;
        assert_eq!(turn.tool_calls[0].arguments, json!({}));
        Ok(())
    }

    #[test]
    fn test_openai_response_without_choices_is_malformed() {
        let result = openai_response_to_turn(&json!({"id": "chatcmpl-1"}));
        assert!(matches!(result, Err(ProviderError::Malformed(_))));
    }

    #[test]
    fn test_message_without_ids_gets_sequential_ids() -> Result<(), ProviderError> {
        let message = json!({
            "content": "",
            "tool_calls": [
                {"function": {"name": "first", "arguments": {"a": 1}}},
                {"function": {"name": "second", "arguments": {}}}
            ]
        });

        let turn = openai_message_to_turn(&message)?;
        let ids: Vec<_> = turn.tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["call_0", "call_1"]);
        assert_eq!(turn.tool_calls[0].arguments, json!({"a": 1}));
        Ok(())
    }

    #[test]
    fn test_text_parts_are_concatenated_in_order() -> Result<(), ProviderError> {
        let message = json!({
            "content": [
                {"type": "text", "text": "Hello, "},
                {"type": "image_url", "image_url": {"url": "x"}},
                {"type": "text", "text": "world"}
            ]
        });

        let turn = openai_message_to_turn(&message)?;
        assert_eq!(turn.text_content(), Some("Hello, world"));
        Ok(())
    }

    #[test]
    fn test_check_openai_context_length_error() {
        let error = json!({
            "code": "context_length_exceeded",
            "message": "This message is too long"
        });

        let result = check_openai_context_length_error(&error);
        assert_eq!(
            result.map(|e| e.to_string()),
            Some("Context length exceeded. Message: This message is too long".to_string())
        );

        let error = json!({
            "code": "other_error",
            "message": "Some other error"
        });
        assert!(check_openai_context_length_error(&error).is_none());
    }
}
