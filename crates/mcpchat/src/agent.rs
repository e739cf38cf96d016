use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::extraction::{extract_image, Extraction};
use crate::models::message::Message;
use crate::providers::base::Provider;
use crate::tools::invoker::ToolInvoker;
use crate::tools::registry::ToolRegistry;

/// Upper bound on model turns per query
pub const MAX_ITERATIONS: usize = 100;

pub const TRUNCATION_NOTICE: &str =
    "\n⚠️ Maximum iterations reached. The automation may be incomplete.";

/// How a query ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// The model answered without asking for more tools
    Completed,
    /// The iteration bound was hit while the model still wanted tools
    Truncated,
    /// The provider could not produce a turn
    Failed,
}

/// Everything a query produced
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// Text of every turn joined by line breaks, plus any notice
    pub text: String,
    /// Raw tool result text in the order the calls were made
    pub tool_results: Vec<String>,
    pub status: QueryStatus,
    /// Number of model turns received
    pub iterations: usize,
}

impl QueryOutcome {
    /// Look for an inline image in the tool results, then in the text
    pub fn extract_image(&self) -> Extraction {
        extract_image(&self.tool_results, &self.text)
    }
}

/// The history of one query, only ever appended to
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
    iteration: usize,
}

impl ConversationState {
    pub fn new(system_prompt: Option<&str>, query: &str) -> Self {
        let mut messages = Vec::new();
        if let Some(prompt) = system_prompt {
            messages.push(Message::system().with_text(prompt));
        }
        messages.push(Message::user().with_text(query));
        Self {
            messages,
            iteration: 0,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }
}

/// Agent drives a provider through rounds of tool use until it has an answer
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: Arc<ToolRegistry>,
    invoker: ToolInvoker,
    max_iterations: usize,
    system_prompt: Option<String>,
}

impl Agent {
    pub fn new(provider: Box<dyn Provider>, registry: Arc<ToolRegistry>, invoker: ToolInvoker) -> Self {
        Self {
            provider,
            registry,
            invoker,
            max_iterations: MAX_ITERATIONS,
            system_prompt: None,
        }
    }

    /// Bound the number of model turns per query, at least one
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Start every query's history with this system message
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one query to completion
    ///
    /// Each call starts from a fresh history. Tool calls within a turn are dispatched one
    /// after the other in the order the model emitted them. A provider failure ends the
    /// query with an error notice in the text rather than an `Err`.
    pub async fn process_query(&self, query: &str) -> QueryOutcome {
        let mut state = ConversationState::new(self.system_prompt.as_deref(), query);
        let mut segments: Vec<String> = Vec::new();
        let mut tool_results = Vec::new();

        let status = loop {
            debug!(
                provider = self.provider.name(),
                iteration = state.iteration + 1,
                "requesting model turn"
            );

            let turn = match self
                .provider
                .generate_turn(state.messages(), self.registry.tools())
                .await
            {
                Ok(turn) => turn,
                Err(e) => {
                    error!(provider = self.provider.name(), error = %e, "provider call failed");
                    segments.push(format!("Error: AI API call failed - {}", e));
                    break QueryStatus::Failed;
                }
            };

            state.push(self.provider.encode_assistant_turn(&turn));
            if let Some(text) = turn.text_content() {
                segments.push(text.to_string());
            }

            if !turn.has_tool_calls() {
                state.iteration += 1;
                break QueryStatus::Completed;
            }

            for call in &turn.tool_calls {
                info!(tool = %call.name, id = %call.id, "dispatching tool call");
                let result = self.invoker.invoke(call).await;
                state.push(self.provider.encode_tool_result(call, &result));
                tool_results.push(result.content);
            }

            state.iteration += 1;
            if state.iteration >= self.max_iterations {
                warn!(iterations = state.iteration, "maximum iterations reached");
                break QueryStatus::Truncated;
            }
        };

        let mut text = segments.join("\n");
        if status == QueryStatus::Truncated {
            text.push_str(TRUNCATION_NOTICE);
        }

        QueryOutcome {
            text,
            tool_results,
            status,
            iterations: state.iteration,
        }
    }
}
