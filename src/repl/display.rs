//! Terminal output for the session loop
//!
//! Banners, status tables, spinners and the answer sink used while a
//! question is being answered.

use colored::*;
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::time::Duration;

use crate::rag::RetrievalConfig;
use crate::store::StoreStatus;
use crate::streaming::{OutputSink, StdoutSink};

const TICK: Duration = Duration::from_millis(100);

/// Spinner with the house style
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(TICK);
    pb
}

/// Hidden spinner for quiet mode
pub fn hidden_spinner() -> ProgressBar {
    ProgressBar::hidden()
}

/// Display manager for REPL UI
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayManager {
    show_progress: bool,
}

impl DisplayManager {
    pub fn new(show_progress: bool) -> Self {
        DisplayManager { show_progress }
    }

    pub fn show_progress(&self) -> bool {
        self.show_progress
    }

    /// Show welcome banner
    pub fn show_banner(&self, version: &str, model: &str, status: &StoreStatus) {
        let width = 64;
        let rule = "=".repeat(width);
        let title = format!("  ollamarag {} - Ask your documents", version);
        let info = format!(
            "  Model: {} | Store: {}/{} | Records: {}",
            model, status.backend, status.collection, status.records
        );

        println!("\n{}", rule.cyan());
        println!("{}", title.bold().cyan());
        println!("{}", info.dimmed());
        println!("{}\n", rule.cyan());
        println!(
            "Type a question (or {} for commands, {} to quit)\n",
            "help".green(),
            "exit".green()
        );
    }

    /// Show store and retrieval settings
    pub fn show_status(&self, status: &StoreStatus, config: &RetrievalConfig) {
        println!("\n{}", "Session Status:".bold().cyan());
        println!("{}", "=".repeat(60).cyan());
        println!("  Store:            {}/{}", status.backend, status.collection.green());
        println!("  Records:          {}", status.records.to_string().green());
        println!("  Retrieval Mode:   {}", config.mode.to_string().green());
        println!("  Top K:            {}", config.top_k.to_string().green());
        println!("  Response Mode:    {}", config.response_mode.to_string().green());
        println!(
            "  Streaming:        {}",
            if config.streaming { "On".green() } else { "Off".red() }
        );
        println!();
    }

    /// Spinner shown until the first answer chunk arrives
    pub fn answer_sink(&self) -> AnswerSink {
        let pending = if self.show_progress {
            spinner("Searching documents...")
        } else {
            hidden_spinner()
        };
        AnswerSink {
            pending: Some(pending),
            out: StdoutSink::new(),
            show_progress: self.show_progress,
        }
    }

    pub fn show_error(&self, error: &str) {
        println!("{} {}", "Error:".red().bold(), error.red());
    }

    pub fn show_warning(&self, warning: &str) {
        println!("{} {}", "Warning:".yellow().bold(), warning.yellow());
    }

    pub fn show_info(&self, info: &str) {
        println!("{} {}", "Info:".cyan(), info);
    }

    pub fn show_success(&self, message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Clear screen
    pub fn clear_screen(&self) -> io::Result<()> {
        execute!(io::stdout(), Clear(ClearType::All), cursor::MoveTo(0, 0))
    }
}

/// Terminal sink that clears the waiting spinner on first output
pub struct AnswerSink {
    pending: Option<ProgressBar>,
    out: StdoutSink,
    show_progress: bool,
}

impl AnswerSink {
    fn clear_spinner(&mut self) {
        if let Some(pb) = self.pending.take() {
            pb.finish_and_clear();
        }
    }
}

impl OutputSink for AnswerSink {
    fn emit(&mut self, chunk: &str) {
        self.clear_spinner();
        self.out.emit(chunk);
    }

    fn reset(&mut self) {
        self.out.reset();
        if self.pending.is_none() {
            self.pending = Some(if self.show_progress {
                spinner("Retrying without streaming...")
            } else {
                hidden_spinner()
            });
        }
    }

    fn finish(&mut self) {
        self.clear_spinner();
        self.out.finish();
    }
}

impl Drop for AnswerSink {
    fn drop(&mut self) {
        self.clear_spinner();
    }
}
