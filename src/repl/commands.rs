//! Built-in session commands
//!
//! Commands are whole-line keywords (`help`, `status`, `mode mmr`, ...), with
//! an optional leading `/`. A line that does not match a command's exact
//! shape is treated as a question.

use colored::*;

use crate::rag::{ResponseMode, RetrievalConfig, RetrievalMode, MAX_TOP_K};

/// REPL command types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Exit,
    Status,
    Clear,
    Mode(RetrievalMode),
    TopK(usize),
    Stream(bool),
    Response(ResponseMode),
}

/// Parse a line into a command, `None` when it is a question
pub fn parse(input: &str) -> Option<Command> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
    let parts: Vec<&str> = trimmed.split_whitespace().collect();

    match parts.as_slice() {
        [word] => match word.to_lowercase().as_str() {
            "help" | "h" | "?" => Some(Command::Help),
            "exit" | "quit" | "q" => Some(Command::Exit),
            "status" => Some(Command::Status),
            "clear" | "cls" => Some(Command::Clear),
            _ => None,
        },
        [word, value] => match word.to_lowercase().as_str() {
            "mode" => value.parse().ok().map(Command::Mode),
            "k" | "top_k" => value
                .parse()
                .ok()
                .filter(|k: &usize| (1..=MAX_TOP_K).contains(k))
                .map(Command::TopK),
            "stream" => match value.to_lowercase().as_str() {
                "on" | "true" | "1" => Some(Command::Stream(true)),
                "off" | "false" | "0" => Some(Command::Stream(false)),
                _ => None,
            },
            "response" => value.parse().ok().map(Command::Response),
            _ => None,
        },
        _ => None,
    }
}

/// Apply a settings command to the session's retrieval configuration.
/// Returns a confirmation line, or `None` for non-settings commands.
pub fn apply(command: &Command, config: &mut RetrievalConfig) -> Option<String> {
    match command {
        Command::Mode(mode) => {
            config.mode = *mode;
            Some(format!("Retrieval mode set to {}", mode))
        }
        Command::TopK(k) => {
            config.top_k = *k;
            Some(format!("Retrieving {} passages per query", k))
        }
        Command::Stream(on) => {
            config.streaming = *on;
            Some(format!("Streaming {}", if *on { "enabled" } else { "disabled" }))
        }
        Command::Response(mode) => {
            config.response_mode = *mode;
            Some(format!("Response mode set to {}", mode))
        }
        _ => None,
    }
}

/// Display help information
pub fn show_help() {
    println!("\n{}", "Available Commands:".bold().cyan());
    println!("{}", "=".repeat(60).cyan());

    let modes = RetrievalMode::ALL
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join("|");
    let mode_usage = format!("mode <{}>", modes);

    let commands = [
        ("help", "Show this help message"),
        ("status", "Show store and retrieval settings"),
        (mode_usage.as_str(), "Change retrieval mode"),
        ("k <n>", "Passages retrieved per query (1-100)"),
        ("stream on|off", "Stream answers as they are generated"),
        ("response compact|simple", "How retrieved context is packed"),
        ("clear", "Clear screen"),
        ("exit, quit", "Leave the session"),
    ];

    for (cmd, desc) in commands {
        println!("  {:<44} {}", cmd.green(), desc);
    }

    println!("\n{}", "Usage:".bold());
    println!("  - Type a question to search the indexed documents");
    println!("  - Use {} for question history", "UP/DOWN arrows".cyan());
    println!("  - Press {} to cancel an answer, {} to leave", "Ctrl-C".cyan(), "Ctrl-D".cyan());
    println!();
}
