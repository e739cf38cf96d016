use anyhow::Result;

pub mod rustyline;
pub mod thinking;

pub trait Prompt {
    /// Show the model's answer
    fn render(&mut self, content: &str);
    fn notify(&mut self, notice: Notice, message: &str);
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&self);
    fn close(&self);
    fn ready(&self) {
        println!("\n");
        println!("MCP Client Started! Type your queries or 'quit' to exit.");
        println!("\n");
    }
}

#[derive(Debug, PartialEq)]
pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Only set for messages
}

impl Input {
    pub fn message<S: Into<String>>(content: S) -> Self {
        Input {
            input_type: InputType::Message,
            content: Some(content.into()),
        }
    }

    pub fn control(input_type: InputType) -> Self {
        Input {
            input_type,
            content: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    AskAgain, // Ask the user for input again. Control flow command.
    Message,  // User sent a query
    Exit,     // User wants to end the session
}

/// Severity of a line printed outside the answer itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Info,
    Warning,
    Error,
}

pub enum Theme {
    Light,
    Dark,
}
