//! Interactive question loop
//!
//! Reads a line, runs it as a command or asks it as a question, and prints
//! the answer as it streams. A failed question prints an error line and the
//! loop keeps going. Ctrl-C cancels the answer in progress; Ctrl-D or `exit`
//! leaves.

pub mod commands;
pub mod display;
pub mod input;

use anyhow::Result;
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::rag::RetrievalConfig;
use crate::repl::commands::Command;
pub use crate::repl::display::{AnswerSink, DisplayManager};
pub use crate::repl::input::{InputEvent, InputHandler};
use crate::streaming::ResponseAdapter;

/// REPL session coordinator
pub struct ReplSession {
    input: InputHandler,
    display: DisplayManager,
    adapter: Arc<ResponseAdapter>,
    config: RetrievalConfig,
    answered: usize,
}

impl ReplSession {
    pub fn new(
        adapter: Arc<ResponseAdapter>,
        config: RetrievalConfig,
        display: DisplayManager,
        history: Option<PathBuf>,
    ) -> Result<Self> {
        let input = match history {
            Some(path) => InputHandler::with_history(path)?,
            None => InputHandler::new()?,
        };

        Ok(ReplSession {
            input,
            display,
            adapter,
            config,
            answered: 0,
        })
    }

    /// Default history file: ~/.ollamarag_history
    pub fn default_history_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".ollamarag_history"))
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn answered(&self) -> usize {
        self.answered
    }

    /// Show the welcome banner
    pub async fn show_welcome(&self, version: &str, model: &str) {
        match self.adapter.engine().knowledge().status().await {
            Ok(status) => self.display.show_banner(version, model, &status),
            Err(e) => self.display.show_warning(&format!("Store status unavailable: {}", e)),
        }
    }

    /// Run until the user leaves
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let line = match self.input.read_line()? {
                InputEvent::Line(line) => line,
                InputEvent::Interrupted => {
                    println!("Use {} or Ctrl-D to quit", "exit".green());
                    continue;
                }
                InputEvent::Eof => break,
            };

            if !self.handle_line(&line).await {
                break;
            }
        }

        if let Err(e) = self.input.save_history() {
            warn!(error = %e, "Could not save history");
        }
        println!("{}", "Goodbye!".green());
        Ok(())
    }

    /// Handle one line. Returns false when the session should end.
    pub async fn handle_line(&mut self, line: &str) -> bool {
        if line.is_empty() {
            return true;
        }

        match commands::parse(line) {
            Some(command) => self.execute(command).await,
            None => {
                self.ask(line).await;
                true
            }
        }
    }

    async fn execute(&mut self, command: Command) -> bool {
        match command {
            Command::Exit => return false,
            Command::Help => commands::show_help(),
            Command::Status => match self.adapter.engine().knowledge().status().await {
                Ok(status) => self.display.show_status(&status, &self.config),
                Err(e) => self.display.show_error(&e.to_string()),
            },
            Command::Clear => {
                if let Err(e) = self.display.clear_screen() {
                    self.display.show_error(&format!("Could not clear screen: {}", e));
                }
            }
            other => {
                if let Some(message) = commands::apply(&other, &mut self.config) {
                    self.display.show_success(&message);
                }
            }
        }
        true
    }

    /// Ask one question, printing the answer or an error line
    pub async fn ask(&mut self, question: &str) {
        let mut sink = self.display.answer_sink();

        tokio::select! {
            result = self.adapter.answer(question, &self.config, &mut sink) => match result {
                Ok(answer) => {
                    self.answered += 1;
                    debug!(chars = answer.len(), "Answer delivered");
                }
                Err(e) => {
                    drop(sink);
                    self.display.show_error(&e.to_string());
                }
            },
            _ = tokio::signal::ctrl_c() => {
                drop(sink);
                println!();
                self.display.show_warning("Answer cancelled");
            }
        }
        println!();
    }
}
