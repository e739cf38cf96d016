use std::io::{self, Write};

use anyhow::Result;
use bat::WrappingMode;
use cliclack::spinner;
use console::style;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use super::{thinking::get_random_thinking_message, Input, InputType, Notice, Prompt, Theme};

const PROMPT: &str = "\x1b[1m\x1b[38;5;30mQuery> \x1b[0m";

pub struct RustylinePrompt {
    editor: DefaultEditor,
    spinner: cliclack::ProgressBar,
    theme: Theme,
}

impl RustylinePrompt {
    pub fn new() -> Result<Self> {
        Ok(RustylinePrompt {
            editor: DefaultEditor::new()?,
            spinner: spinner(),
            theme: Theme::Dark,
        })
    }

    fn theme_name(&self) -> &'static str {
        match self.theme {
            Theme::Light => "GitHub",
            Theme::Dark => "zenburn",
        }
    }
}

/// Map a line typed at the prompt to what the session should do next
pub fn parse_input(line: &str) -> Input {
    let text = line.trim();

    if text.is_empty() {
        return Input::control(InputType::AskAgain);
    }
    if ["quit", "/exit", "/quit"]
        .iter()
        .any(|command| text.eq_ignore_ascii_case(command))
    {
        return Input::control(InputType::Exit);
    }
    Input::message(text)
}

fn print_help() {
    println!("Commands:");
    println!("quit | /exit | /quit - Exit the session");
    println!("/t - Toggle Light/Dark theme");
    println!("/? | /help - Display this help message");
    println!("Anything else is sent to the model as a query");
}

fn print_markdown(content: &str, theme: &str) {
    let printed = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(theme)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print();
    if printed.is_err() {
        println!("{}", content);
    }
}

impl Prompt for RustylinePrompt {
    fn render(&mut self, content: &str) {
        if !content.trim().is_empty() {
            print_markdown(content, self.theme_name());
        }
        println!();
        let _ = io::stdout().flush();
    }

    fn notify(&mut self, notice: Notice, message: &str) {
        match notice {
            Notice::Info => println!("{}", style(message).dim()),
            Notice::Warning => println!("{}", style(message).yellow()),
            Notice::Error => eprintln!("{}", style(message).red()),
        }
    }

    fn show_busy(&mut self) {
        self.spinner = spinner();
        self.spinner
            .start(format!("{}...", get_random_thinking_message()));
    }

    fn hide_busy(&self) {
        self.spinner.stop("");
    }

    fn get_input(&mut self) -> Result<Input> {
        let line = match self.editor.readline(PROMPT) {
            Ok(line) => line,
            Err(e) => {
                match e {
                    ReadlineError::Interrupted | ReadlineError::Eof => (),
                    _ => eprintln!("Input error: {}", e),
                }
                return Ok(Input::control(InputType::Exit));
            }
        };

        let trimmed = line.trim();
        if !trimmed.is_empty() {
            let _ = self.editor.add_history_entry(trimmed);
        }

        if trimmed.eq_ignore_ascii_case("/t") {
            self.theme = match self.theme {
                Theme::Light => {
                    println!("Switching to Dark theme");
                    Theme::Dark
                }
                Theme::Dark => {
                    println!("Switching to Light theme");
                    Theme::Light
                }
            };
            return Ok(Input::control(InputType::AskAgain));
        }
        if trimmed.eq_ignore_ascii_case("/?") || trimmed.eq_ignore_ascii_case("/help") {
            print_help();
            return Ok(Input::control(InputType::AskAgain));
        }

        Ok(parse_input(trimmed))
    }

    fn close(&self) {
        // No cleanup required
    }
}
