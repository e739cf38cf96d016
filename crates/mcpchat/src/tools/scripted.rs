use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::server::{ToolOutput, ToolServer};
use crate::models::tool::Tool;

enum Scripted {
    Output(ToolOutput),
    Failure(String),
}

/// An in-memory tool server for tests
///
/// Tools without a scripted response answer with `"<name> ok"`. Every call is recorded
/// together with the highest number of calls that were ever in flight at once.
#[derive(Clone)]
pub struct ScriptedToolServer {
    tools: Vec<Tool>,
    responses: Arc<Mutex<HashMap<String, Scripted>>>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    disconnected: Arc<AtomicBool>,
}

impl ScriptedToolServer {
    pub fn new(tools: Vec<Tool>) -> Self {
        Self {
            tools,
            responses: Arc::new(Mutex::new(HashMap::new())),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_tool_names(names: &[&str]) -> Self {
        Self::new(
            names
                .iter()
                .map(|name| Tool::new(*name, format!("The {} tool", name), json!({"type": "object"})))
                .collect(),
        )
    }

    pub fn with_response(self, name: &str, output: ToolOutput) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(name.to_string(), Scripted::Output(output));
        self
    }

    pub fn with_failure(self, name: &str, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(name.to_string(), Scripted::Failure(message.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolServer for ScriptedToolServer {
    async fn list_tools(&self) -> Result<Vec<Tool>> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput> {
        if self.is_disconnected() {
            return Err(anyhow!("not connected"));
        }
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.responses.lock().unwrap().get(name) {
            Some(Scripted::Output(output)) => Ok(output.clone()),
            Some(Scripted::Failure(message)) => Err(anyhow!(message.clone())),
            None => Ok(ToolOutput::new(json!(format!("{} ok", name)))),
        }
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}
