use serde::{Deserialize, Serialize};

use super::role::Role;
use super::tool::ToolCall;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One entry in the conversation history
///
/// Assistant messages may carry the tool calls they requested, and tool messages
/// carry the id of the call they answer. Which of these fields a provider actually
/// fills in depends on its encoding, see [`crate::providers::utils::TurnEncoding`].
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn with_role(role: Role) -> Self {
        Message {
            role,
            content: String::new(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a new user message
    pub fn user() -> Self {
        Self::with_role(Role::User)
    }

    /// Create a new assistant message
    pub fn assistant() -> Self {
        Self::with_role(Role::Assistant)
    }

    /// Create a new system message
    pub fn system() -> Self {
        Self::with_role(Role::System)
    }

    /// Create a tool result message answering the call with the given id
    pub fn tool<S: Into<String>>(tool_call_id: S) -> Self {
        Message {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(Role::Tool)
        }
    }

    /// Append text content to the message
    pub fn with_text<S: AsRef<str>>(mut self, text: S) -> Self {
        self.content.push_str(text.as_ref());
        self
    }

    /// Attach a tool call to the message
    pub fn with_tool_call(mut self, tool_call: ToolCall) -> Self {
        self.tool_calls.push(tool_call);
        self
    }

    /// Attach several tool calls to the message, keeping their order
    pub fn with_tool_calls<I: IntoIterator<Item = ToolCall>>(mut self, tool_calls: I) -> Self {
        self.tool_calls.extend(tool_calls);
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// A complete model response, independent of the provider that produced it
pub struct ModelTurn {
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl ModelTurn {
    /// A turn with text only
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::default().with_text(text)
    }

    /// Set the text of the turn, an empty string counts as no text
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        let text = text.into();
        self.content = (!text.is_empty()).then_some(text);
        self
    }

    pub fn with_tool_call(mut self, tool_call: ToolCall) -> Self {
        self.tool_calls.push(tool_call);
        self
    }

    /// The text of the turn, if it carries any
    pub fn text_content(&self) -> Option<&str> {
        self.content.as_deref().filter(|text| !text.is_empty())
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// A turn with neither text nor tool calls ends the conversation loop
    pub fn is_empty(&self) -> bool {
        self.text_content().is_none() && !self.has_tool_calls()
    }
}
