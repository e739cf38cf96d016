use thiserror::Error;

/// Failure of a provider backend to produce a turn
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("Server error: {status}")]
    ServerError { status: u16 },

    #[error("Request failed: {status} - {message}")]
    Rejected { status: u16, message: String },

    #[error("Context length exceeded. Message: {0}")]
    ContextLengthExceeded(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Unreachable(err.to_string())
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("tool call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("{0}")]
    Transport(String),
}

pub type ToolResult<T> = Result<T, ToolError>;
