//! These models represent the objects passed around by the conversation loop
//!
//! There are several different related formats we need to interact with:
//! - openai chat completion messages/tools, sent from the agent to the LLM
//! - anthropic messages/tools, sent from the agent to the LLM
//! - ollama chat messages/tools, sent from the agent to a local model
//! - mcp tool definitions and call results, exchanged with the tool server
//!
//! These all overlap to varying degrees. Providers convert between the wire formats
//! and the internal structs here, so the loop itself never touches provider json.
pub mod message;
pub mod role;
pub mod tool;
