//! The tool-serving side of the conversation.
//!
//! A [`server::ToolServer`] is whatever process actually runs the tools. The
//! [`registry::ToolRegistry`] snapshots what it offers once per connection and the
//! [`invoker::ToolInvoker`] turns each model-issued call into a flat text result.
pub mod invoker;
pub mod registry;
pub mod server;

#[cfg(test)]
pub mod scripted;
