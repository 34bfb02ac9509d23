//! Command-line argument parsing for ollamarag
//!
//! Provides clap-based CLI with subcommands, verbosity control and
//! per-run overrides of the configuration file.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Config, StoreBackend};
use crate::rag::{ResponseMode, RetrievalMode};

/// ollamarag - Ask questions about your documents with a local Ollama model
#[derive(Parser, Debug)]
#[command(name = "ollamarag")]
#[command(author = "Jerome (Kubashen) Naidoo")]
#[command(version)]
#[command(about = "Retrieval-augmented question answering over a local document folder", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory of documents to index
    #[arg(long, global = true)]
    pub docs_dir: Option<PathBuf>,

    /// Directory holding the persisted store
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    /// Store collection name
    #[arg(long, global = true)]
    pub collection: Option<String>,

    /// Store backend (local or qdrant)
    #[arg(long, global = true, value_parser = parse_backend)]
    pub backend: Option<StoreBackend>,

    /// Completion model
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Embedding model
    #[arg(long, global = true)]
    pub embed_model: Option<String>,

    /// Retrieval mode: default, embedding, mmr, global, local
    #[arg(long, global = true)]
    pub mode: Option<RetrievalMode>,

    /// Response mode: compact or simple
    #[arg(long, global = true)]
    pub response_mode: Option<ResponseMode>,

    /// Passages retrieved per query
    #[arg(short = 'k', long, global = true)]
    pub top_k: Option<usize>,

    /// Wait for the whole answer instead of streaming it
    #[arg(long, global = true)]
    pub no_stream: bool,

    /// Subcommand (defaults to `start`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start interactive question loop
    Start,

    /// Answer one question and exit
    Ask {
        /// The question
        #[arg(value_name = "QUESTION", required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Build the index if the store is empty, then print the report
    Ingest,

    /// Show store and model status
    Status,

    /// Display current configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

fn parse_backend(value: &str) -> Result<StoreBackend, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "local" => Ok(StoreBackend::Local),
        "qdrant" => Ok(StoreBackend::Qdrant),
        other => Err(format!("unknown backend '{}' (expected local or qdrant)", other)),
    }
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Subcommand to run
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Start)
    }

    /// Apply command-line overrides on top of file values
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref dir) = self.docs_dir {
            config.corpus.docs_dir = dir.clone();
        }
        if let Some(ref dir) = self.store_dir {
            config.store.path = dir.clone();
        }
        if let Some(ref collection) = self.collection {
            config.store.collection = collection.clone();
        }
        if let Some(backend) = self.backend {
            config.store.backend = backend;
        }
        if let Some(ref model) = self.model {
            config.ollama.llm_model = model.clone();
        }
        if let Some(ref model) = self.embed_model {
            config.ollama.embed_model = model.clone();
        }
        if let Some(mode) = self.mode {
            config.retrieval.mode = mode;
        }
        if let Some(mode) = self.response_mode {
            config.retrieval.response_mode = mode;
        }
        if let Some(k) = self.top_k {
            config.retrieval.top_k = k;
        }
        if self.no_stream {
            config.retrieval.streaming = false;
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Check if should show spinners
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should show retrieval details
    pub fn show_details(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("ollamarag").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_verbosity_quiet() {
        assert_eq!(parse(&["-q"]).verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(parse(&[]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["-v"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["-vv"]).verbosity(), Verbosity::VeryVerbose);
    }

    #[test]
    fn test_default_command_is_start() {
        assert_eq!(parse(&[]).command(), Commands::Start);
    }

    #[test]
    fn test_ask_joins_words() {
        let args = parse(&["ask", "what", "is", "rust?"]);
        match args.command() {
            Commands::Ask { question } => assert_eq!(question.join(" "), "what is rust?"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_overrides_apply() {
        let args = parse(&[
            "--mode", "mmr", "-k", "9", "--no-stream", "--docs-dir", "notes", "--backend", "qdrant",
            "status",
        ]);
        let mut config = Config::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.retrieval.mode, RetrievalMode::Mmr);
        assert_eq!(config.retrieval.top_k, 9);
        assert!(!config.retrieval.streaming);
        assert_eq!(config.corpus.docs_dir, PathBuf::from("notes"));
        assert_eq!(config.store.backend, StoreBackend::Qdrant);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let result = Args::try_parse_from(["ollamarag", "--mode", "tree"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_verbosity_as_str() {
        assert_eq!(Verbosity::Quiet.as_str(), "quiet");
        assert_eq!(Verbosity::VeryVerbose.as_str(), "very_verbose");
        assert!(!Verbosity::Quiet.show_progress());
        assert!(Verbosity::Verbose.show_details());
    }
}
