pub mod agent;
pub mod errors;
pub mod extraction;
pub mod mcp;
pub mod models;
pub mod providers;
pub mod tools;
