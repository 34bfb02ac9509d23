use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::sync::Arc;
use tracing::{error, info};

use ollamarag::cli::{Args, Commands, Verbosity};
use ollamarag::config::Config;
use ollamarag::context::TextChunker;
use ollamarag::corpus::CorpusLoader;
use ollamarag::index::{ensure_directories, IndexLifecycleManager, LifecycleOutcome};
use ollamarag::logging;
use ollamarag::rag::QueryEngine;
use ollamarag::repl::display::{hidden_spinner, spinner};
use ollamarag::repl::{DisplayManager, ReplSession};
use ollamarag::store::{open_store, KnowledgeStoreAdapter};
use ollamarag::streaming::{OllamaClient, ResponseAdapter};
use ollamarag::RagError;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Components shared by every subcommand that touches the store
struct App {
    config: Config,
    client: Arc<OllamaClient>,
    knowledge: Arc<KnowledgeStoreAdapter>,
    display: DisplayManager,
}

impl App {
    async fn open(config: Config, verbosity: Verbosity) -> Result<Self> {
        ensure_directories(&config.corpus.docs_dir, &config.store.path)
            .await
            .context("Failed to prepare document and store directories")?;

        let store = open_store(&config.store).await.map_err(fatal)?;
        info!(
            backend = store.backend(),
            collection = store.collection(),
            "Knowledge store opened"
        );

        let client = Arc::new(
            OllamaClient::from_config(&config.ollama).context("Failed to create Ollama client")?,
        );

        let chunker = TextChunker::new(config.corpus.chunk_size, config.corpus.chunk_overlap);
        let knowledge = Arc::new(
            KnowledgeStoreAdapter::new(store, client.clone())
                .with_chunker(chunker)
                .with_max_concurrency(config.ingestion.max_concurrency),
        );

        Ok(App {
            config,
            client,
            knowledge,
            display: DisplayManager::new(verbosity.show_progress()),
        })
    }

    /// Reuse or build the index, interruptible with Ctrl-C
    async fn start_index(&self) -> Result<LifecycleOutcome> {
        let mut lifecycle = IndexLifecycleManager::new(
            self.knowledge.clone(),
            CorpusLoader::new(),
            self.config.corpus.docs_dir.clone(),
        );

        let pb = if self.display.show_progress() {
            spinner("Preparing index...")
        } else {
            hidden_spinner()
        };

        let outcome = tokio::select! {
            outcome = lifecycle.start() => outcome,
            _ = tokio::signal::ctrl_c() => {
                pb.finish_and_clear();
                anyhow::bail!("Interrupted while preparing the index");
            }
        };
        pb.finish_and_clear();

        let outcome = outcome.map_err(fatal)?;
        report_outcome(&self.display, &outcome);
        Ok(outcome)
    }

    fn response_adapter(&self) -> Arc<ResponseAdapter> {
        let engine = Arc::new(QueryEngine::new(self.knowledge.clone(), self.client.clone()));
        Arc::new(ResponseAdapter::new(engine))
    }
}

/// Store failures end the process; everything else is reported normally
fn fatal(e: RagError) -> anyhow::Error {
    if e.is_fatal() {
        error!(error = %e, "Cannot continue without the knowledge store");
    }
    anyhow::Error::new(e)
}

fn report_outcome(display: &DisplayManager, outcome: &LifecycleOutcome) {
    match outcome {
        LifecycleOutcome::Loaded { records } => {
            display.show_success(&format!("Loaded existing index ({} records)", records));
        }
        LifecycleOutcome::Built { report, insert } => {
            display.show_success(&format!("Built index: {}", insert.summary()));
            display.show_info(&format!("Corpus: {}", report.summary()));
            for (source, reason) in &insert.documents_failed {
                display.show_warning(&format!("{} not indexed: {}", source, reason));
            }
        }
        LifecycleOutcome::Resumed {
            report,
            insert,
            missing,
        } => {
            display.show_warning(&format!(
                "Previous indexing was interrupted; added {} missing document(s): {}",
                missing.len(),
                missing.join(", ")
            ));
            display.show_success(&format!("Index completed: {}", insert.summary()));
            display.show_info(&format!("Corpus: {}", report.summary()));
            for (source, reason) in &insert.documents_failed {
                display.show_warning(&format!("{} not indexed: {}", source, reason));
            }
        }
        LifecycleOutcome::BuiltEmpty { report } => {
            display.show_warning(&format!(
                "No documents indexed ({}); answers will not use document context",
                report.summary()
            ));
        }
    }
}

async fn run_repl(app: &App) -> Result<()> {
    app.start_index().await?;

    let mut session = ReplSession::new(
        app.response_adapter(),
        app.config.retrieval.clone(),
        app.display,
        ReplSession::default_history_path(),
    )?;

    session.show_welcome(VERSION, app.client.model()).await;
    session.run().await
}

async fn run_ask(app: &App, question: &str) -> Result<()> {
    app.start_index().await?;

    let adapter = app.response_adapter();
    let mut sink = app.display.answer_sink();

    tokio::select! {
        result = adapter.answer(question, &app.config.retrieval, &mut sink) => {
            result.context("Query failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            anyhow::bail!("Interrupted");
        }
    }
    Ok(())
}

async fn run_status(app: &App) -> Result<()> {
    let status = app
        .knowledge
        .status()
        .await
        .context("Failed to read store status")?;
    app.display.show_status(&status, &app.config.retrieval);

    let healthy = app.client.health_check().await.unwrap_or(false);
    println!("{}", "Ollama:".bold().cyan());
    println!("  URL:              {}", app.client.base_url());
    println!(
        "  Reachable:        {}",
        if healthy { "Yes".green() } else { "No".red() }
    );
    println!("  LLM Model:        {}", app.client.model());
    println!("  Embedding Model:  {}", app.client.embed_model());

    if healthy {
        if let Ok(models) = app.client.list_models().await {
            for wanted in [app.client.model(), app.client.embed_model()] {
                let installed = models
                    .iter()
                    .any(|m| m == wanted || m.split(':').next() == Some(wanted));
                if !installed {
                    app.display.show_warning(&format!(
                        "Model '{}' not installed. Pull it with: ollama pull {}",
                        wanted, wanted
                    ));
                }
            }
        }
    } else {
        app.display
            .show_warning("Ollama is not running. Start it with: ollama serve");
    }
    println!();
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    let path = Config::default_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(no home directory)".to_string());

    println!("\n{}", "ollamarag Configuration".bold().cyan());
    println!("{}", "=".repeat(60).cyan());
    println!("{} {}\n", "Default file:".dimmed(), path.dimmed());

    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let verbosity = args.verbosity();
    logging::init(verbosity);

    let mut config = Config::load(args.config.clone()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    let command = args.command();
    if command == Commands::Config {
        return show_config(&config);
    }

    let app = App::open(config, verbosity).await?;

    match command {
        Commands::Start => run_repl(&app).await,
        Commands::Ask { question } => run_ask(&app, &question.join(" ")).await,
        Commands::Ingest => app.start_index().await.map(|_| ()),
        Commands::Status => run_status(&app).await,
        Commands::Config => Ok(()),
    }
}
