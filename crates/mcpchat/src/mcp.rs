//! A client for tool servers speaking the Model Context Protocol.
//!
//! Servers are either local scripts spawned as child processes and driven over their
//! stdio, or remote endpoints reached over streamable HTTP. Both carry JSON-RPC 2.0.
pub mod client;
pub mod http;
pub mod transport;
pub mod types;
