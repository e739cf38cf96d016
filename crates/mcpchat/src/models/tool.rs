use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

/// A tool that can be used by a model.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// The name of the tool, unique within a registry
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// A JSON schema describing the arguments the tool accepts
    pub input_schema: Value,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

impl Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Correlation id, assigned by the provider or synthesized by the adapter
    pub id: String,
    /// The name of the tool to execute
    pub name: String,
    /// The arguments for the execution, any json value
    pub arguments: Value,
}

impl ToolCall {
    pub fn new<I: Into<String>, S: Into<String>>(id: I, name: S, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// The flattened outcome of a single tool invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn success<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}
