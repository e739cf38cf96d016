use anyhow::Result;
use std::path::PathBuf;

use crate::prompt::{InputType, Notice, Prompt};
use crate::screenshots::save_screenshot;
use mcpchat::agent::{Agent, QueryOutcome, QueryStatus};

pub struct Session<'a> {
    agent: Agent,
    prompt: Box<dyn Prompt + 'a>,
    downloads_dir: PathBuf,
}

impl<'a> Session<'a> {
    pub fn new(agent: Agent, prompt: Box<dyn Prompt + 'a>, downloads_dir: PathBuf) -> Self {
        Session {
            agent,
            prompt,
            downloads_dir,
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        self.prompt.ready();

        loop {
            let input = self.prompt.get_input()?;
            match input.input_type {
                InputType::Message => {
                    if let Some(content) = &input.content {
                        self.run_query(content).await;
                    }
                }
                InputType::Exit => break,
                InputType::AskAgain => continue,
            }
        }
        self.prompt.close();
        Ok(())
    }

    /// Run a single query without reading from the prompt
    pub async fn headless_start(&mut self, query: &str) -> Option<QueryStatus> {
        let status = self.run_query(query).await;
        self.prompt.close();
        status
    }

    /// `None` when the user interrupted the query
    async fn run_query(&mut self, query: &str) -> Option<QueryStatus> {
        self.prompt.show_busy();
        let outcome = tokio::select! {
            outcome = self.agent.process_query(query) => Some(outcome),
            _ = tokio::signal::ctrl_c() => None,
        };
        self.prompt.hide_busy();

        match outcome {
            Some(outcome) => {
                self.present(&outcome);
                Some(outcome.status)
            }
            None => {
                self.prompt
                    .notify(Notice::Warning, "Interrupt: abandoned the current query");
                None
            }
        }
    }

    fn present(&mut self, outcome: &QueryOutcome) {
        let extraction = outcome.extract_image();

        if let Some(image) = &extraction.image {
            match save_screenshot(&self.downloads_dir, image) {
                Ok(path) => self.prompt.notify(
                    Notice::Info,
                    &format!("📸 Screenshot saved to {}", path.display()),
                ),
                Err(e) => self
                    .prompt
                    .notify(Notice::Error, &format!("Failed to save screenshot: {:#}", e)),
            }
        }

        self.prompt.render(&extraction.display_text);

        match outcome.status {
            QueryStatus::Completed => {}
            QueryStatus::Truncated => self.prompt.notify(
                Notice::Warning,
                &format!(
                    "Stopped after {} model turns; ask again to let it continue",
                    outcome.iterations
                ),
            ),
            QueryStatus::Failed => self
                .prompt
                .notify(Notice::Error, "The model could not be reached for this query"),
        }
    }
}
