use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mcpchat::agent::{Agent, QueryStatus};
use mcpchat::extraction::ImageOrigin;
use mcpchat::mcp::client::McpClient;
use mcpchat::models::tool::Tool;
use mcpchat::providers::configs::{AnthropicProviderConfig, OpenAiProviderConfig, ProviderConfig};
use mcpchat::providers::factory::get_provider;
use mcpchat::tools::invoker::ToolInvoker;
use mcpchat::tools::registry::ToolRegistry;
use mcpchat::tools::server::{ToolOutput, ToolServer};

/// In-process tool server that echoes its input back
#[derive(Default)]
struct EchoServer {
    calls: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl ToolServer for EchoServer {
    async fn list_tools(&self) -> Result<Vec<Tool>> {
        Ok(vec![
            Tool::new(
                "echo",
                "Repeat the given text",
                json!({"type": "object", "properties": {"text": {"type": "string"}}}),
            ),
            Tool::new(
                "browser_take_screenshot",
                "Capture the current page",
                json!({"type": "object"}),
            ),
        ])
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));
        match name {
            "echo" => Ok(ToolOutput::new(json!(format!(
                "echo: {}",
                arguments["text"].as_str().unwrap_or_default()
            )))),
            "browser_take_screenshot" => Ok(ToolOutput::new(json!([
                {"type": "image", "data": "iVBORw0KGgo=", "mimeType": "image/png"}
            ]))),
            other => anyhow::bail!("unknown tool {}", other),
        }
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

async fn agent_for(config: ProviderConfig, server: Arc<dyn ToolServer>) -> Agent {
    let registry = ToolRegistry::discover(server.as_ref()).await.unwrap();
    Agent::new(
        get_provider(config).unwrap(),
        Arc::new(registry),
        ToolInvoker::new(server),
    )
}

fn openai_config(server: &MockServer) -> ProviderConfig {
    ProviderConfig::OpenAi(OpenAiProviderConfig {
        host: server.uri(),
        api_key: "test_api_key".to_string(),
        model: "gpt-4o-mini".to_string(),
        temperature: None,
        max_tokens: None,
    })
}

fn openai_tool_call(id: &str, name: &str, arguments: Value) -> Value {
    json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": id,
                    "type": "function",
                    "function": {"name": name, "arguments": arguments.to_string()}
                }]
            }
        }]
    })
}

fn openai_text(text: &str) -> Value {
    json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
}

#[tokio::test]
async fn test_openai_loop_with_echo_server() {
    let mock_server = MockServer::start().await;
    // mounted first so it wins once the tool result is in the history
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("tool_call_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_text("The tool said hi")))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_tool_call(
            "call_abc",
            "echo",
            json!({"text": "hi"}),
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let tools = Arc::new(EchoServer::default());
    let agent = agent_for(openai_config(&mock_server), tools.clone()).await;

    let outcome = agent.process_query("Say hi through the echo tool").await;

    assert_eq!(outcome.status, QueryStatus::Completed);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.text, "The tool said hi");
    assert_eq!(outcome.tool_results, vec!["echo: hi"]);
    assert_eq!(
        *tools.calls.lock().unwrap(),
        vec![("echo".to_string(), json!({"text": "hi"}))]
    );

    let requests = mock_server.received_requests().await.unwrap();
    let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
    let messages = second["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["tool_calls"][0]["id"], "call_abc");
    assert_eq!(messages[2]["role"], "tool");
    assert_eq!(messages[2]["tool_call_id"], "call_abc");
    assert_eq!(messages[2]["content"], "echo: hi");
    assert_eq!(second["tools"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_claude_loop_sends_results_as_user_text() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_string_contains("iVBORw0KGgo="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "Captured the page."}]
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "text", "text": "Taking a screenshot."},
                {"type": "tool_use", "id": "toolu_01", "name": "browser_take_screenshot", "input": {}}
            ]
        })))
        .mount(&mock_server)
        .await;

    let config = ProviderConfig::Anthropic(AnthropicProviderConfig {
        host: mock_server.uri(),
        api_key: "test_api_key".to_string(),
        model: "claude-3-5-sonnet-latest".to_string(),
        temperature: None,
        max_tokens: None,
    });
    let agent = agent_for(config, Arc::new(EchoServer::default()))
        .await
        .with_system_prompt("You drive a browser.");

    let outcome = agent.process_query("Screenshot the page").await;

    assert_eq!(outcome.status, QueryStatus::Completed);
    assert_eq!(outcome.text, "Taking a screenshot.\nCaptured the page.");

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(second["system"], "You drive a browser.");
    let messages = second["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[2]["role"], "user");

    let extraction = outcome.extract_image();
    let image = extraction.image.unwrap();
    assert_eq!(image.data, "iVBORw0KGgo=");
    assert_eq!(image.mime_type.as_deref(), Some("image/png"));
    assert_eq!(image.origin, ImageOrigin::ToolResult { index: 0 });
    assert_eq!(extraction.display_text, outcome.text);
}

#[tokio::test]
async fn test_full_loop_over_mcp_http() {
    let tool_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "initialize"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Mcp-Session-Id", "session-42")
                .set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": {
                        "protocolVersion": "2024-11-05",
                        "capabilities": {"tools": {}},
                        "serverInfo": {"name": "weather", "version": "1.0.0"}
                    }
                })),
        )
        .mount(&tool_server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "notifications/initialized"})))
        .respond_with(ResponseTemplate::new(202))
        .mount(&tool_server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "tools/list"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": {"tools": [{
                "name": "get_forecast",
                "description": "Get the forecast for a city",
                "inputSchema": {"type": "object", "properties": {"city": {"type": "string"}}}
            }]}
        })))
        .mount(&tool_server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(
            json!({"method": "tools/call", "params": {"name": "get_forecast"}}),
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":3,\"result\":{\"content\":[\"Sunny\",\"22C\"],\"isError\":false}}\n\n",
                "text/event-stream",
            ),
        )
        .expect(1)
        .mount(&tool_server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&tool_server)
        .await;

    let model_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("tool_call_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_text("It will be sunny, 22C.")))
        .mount(&model_server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_tool_call(
            "call_1",
            "get_forecast",
            json!({"city": "Lisbon"}),
        )))
        .mount(&model_server)
        .await;

    let client = Arc::new(McpClient::connect(&tool_server.uri()).await.unwrap());
    assert_eq!(client.server_name(), "weather");

    let agent = agent_for(openai_config(&model_server), client.clone()).await;
    assert_eq!(agent.registry().names(), vec!["get_forecast"]);

    let outcome = agent.process_query("Weather in Lisbon?").await;
    assert_eq!(outcome.status, QueryStatus::Completed);
    assert_eq!(outcome.tool_results, vec!["Sunny\n22C"]);
    assert_eq!(outcome.text, "It will be sunny, 22C.");

    client.disconnect().await.unwrap();
    client.disconnect().await.unwrap();
}
