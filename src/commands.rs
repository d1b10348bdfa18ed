use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{Config, EmbeddingProvider};
use crate::documents::{self, Document};
use crate::embeddings::ollama::OllamaEmbedder;
use crate::manager::{IndexOutcome, Manager};
use crate::matching::Strategy;
use crate::vector_store::{CacheStatus, SqliteVectorStore, VectorStore};

const EXAMPLES_SHOWN: usize = 2;
const USAGE_LINES_SHOWN: usize = 3;

fn spinner(message: &str) -> Result<ProgressBar> {
    let bar = if console::user_attended_stderr() {
        let bar = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .context("Invalid progress template")?,
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message.to_string());
    Ok(bar)
}

/// Load command docs and build (or reuse) the embeddings cache
#[inline]
pub async fn index(config: &Config, force: bool) -> Result<()> {
    info!("Indexing command docs in {}", config.commands_dir().display());

    let manager = Manager::from_config(config)
        .await
        .context("Failed to initialize retrieval")?;

    let bar = spinner("Indexing command docs")?;
    let result = manager.index(force).await;
    bar.finish_and_clear();
    let report = result.context("Indexing failed")?;

    println!(
        "Loaded {} command docs from {}",
        style(report.load.loaded).cyan(),
        config.commands_dir().display()
    );

    for (path, error) in &report.load.failures.failures {
        println!(
            "  {} {}: {}",
            style("skipped").yellow(),
            path.display(),
            error
        );
    }

    match report.outcome {
        IndexOutcome::KeywordOnly => {
            println!("No embedding provider configured; keyword matching only.");
        }
        IndexOutcome::Reused => {
            println!("{}", style("✓ Embeddings cache is up to date").green());
        }
        IndexOutcome::Rebuilt { reason } => {
            match reason {
                Some(reason) => println!("Rebuilt embeddings ({})", reason),
                None => println!("Rebuilt embeddings (forced)"),
            }
            if let Some((backend, store)) = manager.semantic_backend().await {
                println!("  Provider: {}", backend);
                println!("  Store: {}", store);
            }
        }
    }

    Ok(())
}

/// List every loadable command doc
#[inline]
pub fn list(config: &Config) -> Result<()> {
    let commands_dir = config.commands_dir();
    let outcome = documents::load_dir(&commands_dir)
        .with_context(|| format!("Failed to read {}", commands_dir.display()))?;

    if outcome.documents.is_empty() {
        println!("No command docs found in {}", commands_dir.display());
        println!("Add markdown files there, one per command.");
        return Ok(());
    }

    println!("Command Docs ({} total):", outcome.documents.len());
    println!();

    for doc in outcome
        .documents
        .iter()
        .sorted_by(|a, b| a.command.cmp(&b.command))
    {
        print_summary(doc);
    }

    if let Some(failures) = outcome.warning() {
        println!("{}", style(failures).yellow());
    }

    Ok(())
}

fn print_summary(doc: &Document) {
    print!("📄 {}", style(&doc.command).bold());
    if let Some(version) = &doc.version {
        print!(" {}", style(version).dim());
    }
    println!();

    if !doc.aliases.is_empty() {
        println!("   Aliases: {}", doc.aliases.iter().join(", "));
    }
    if !doc.keywords.is_empty() {
        println!("   Keywords: {}", doc.keywords.iter().join(", "));
    }
    if let Some(priority) = doc.priority {
        println!("   Priority: {}", priority);
    }
    println!("   Examples: {}", doc.examples.len());
    println!("   File: {}", style(&doc.filename).dim());
    println!();
}

/// Show the docs that would be handed to prompt construction for `query`
#[inline]
pub async fn search(
    config: &Config,
    query: &str,
    max_docs: Option<usize>,
    strategy: Option<Strategy>,
) -> Result<()> {
    let mut retrieval = config.retrieval.clone();
    if let Some(max_docs) = max_docs {
        retrieval.set_max_docs(max_docs)?;
    }

    let bar = spinner("Loading command docs")?;
    let prepared = Manager::for_queries(config, strategy).await;
    bar.finish_and_clear();
    let manager = prepared.context("Failed to prepare command docs")?;

    let strategy = manager.strategy().await;
    debug!("Searching with {} strategy", strategy);

    let docs = manager.relevant_docs(query, retrieval.max_docs).await?;
    if docs.is_empty() {
        println!("No relevant command docs for \"{}\" ({})", query, strategy);
        return Ok(());
    }

    println!(
        "Relevant command docs for \"{}\" ({}):",
        style(query).cyan(),
        strategy
    );
    println!();

    for (rank, doc) in docs.iter().enumerate() {
        println!("{}. {}", rank + 1, style(&doc.command).bold());
        let usage = documents::extract_common_patterns(&doc.content, USAGE_LINES_SHOWN);
        for line in usage.lines() {
            println!("   $ {}", line);
        }
        for example in doc.examples.iter().take(EXAMPLES_SHOWN) {
            println!("   \"{}\" → {}", example.user_request, style(&example.command).green());
        }
        println!("   {}", style(&doc.filename).dim());
    }

    Ok(())
}

/// Show retrieval configuration, docs and cache health
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("{}", style("Retrieval Status").bold().cyan());
    println!();

    println!("  Enabled: {}", config.retrieval.enabled);
    println!("  Strategy: {}", config.retrieval.strategy);
    println!("  Max Docs: {}", config.retrieval.max_docs);
    println!("  Provider: {}", config.retrieval.provider);

    match config.retrieval.provider {
        EmbeddingProvider::None => {}
        EmbeddingProvider::Ollama => {
            let health = OllamaEmbedder::new(&config.ollama)
                .map(|client| client.with_retry_attempts(1))
                .and_then(|client| client.health_check());
            match health {
                Ok(()) => println!("  Ollama: {} ({})", config.ollama.model, style("ready").green()),
                Err(e) => println!("  Ollama: {} ({})", config.ollama.model, style(e).red()),
            }
        }
        EmbeddingProvider::OpenAi => {
            let key = config
                .openai
                .masked_api_key()
                .unwrap_or_else(|| "not set".to_string());
            println!("  OpenAI: {} (key: {})", config.openai.model, key);
        }
    }
    println!();

    // opening the manager creates the cache file
    let db_path = config.embeddings_db_path();
    let cache_exists = db_path.exists();

    let manager = match Manager::from_config(config).await {
        Ok(manager) => manager,
        Err(e) => {
            println!("  {}", style(&e).red());
            println!();
            Manager::new(config.commands_dir(), config.retrieval.strategy, None)
        }
    };
    let report = manager.load().await?;

    println!("{}", style("Command Docs").bold().yellow());
    println!("  Directory: {}", manager.commands_dir().display());
    println!("  Loaded: {}", report.loaded);
    if !documents::has_commands(manager.commands_dir())? {
        println!("  Add one markdown file per command to get started.");
    }
    if !report.failures.is_empty() {
        println!("  Failed: {}", style(report.failures.len()).red());
    }
    println!();

    println!("{}", style("Embeddings Cache").bold().yellow());
    if !cache_exists {
        println!("  Not built yet. Run 'please index' to create it.");
        return Ok(());
    }

    let store = SqliteVectorStore::open(&db_path).await?;
    println!("  Path: {}", db_path.display());
    println!("  Vectors: {}", store.count().await?);
    if let Some(provenance) = store.provenance().await? {
        println!("  Built With: {}", provenance);
    }
    if let Some(indexed_at) = store.indexed_at().await? {
        println!("  Last Indexed: {}", indexed_at.format("%Y-%m-%d %H:%M:%S"));
    }
    store.close().await;

    match manager.cache_status().await? {
        Some(CacheStatus::Valid) => println!("  State: {}", style("up to date").green()),
        Some(status) => println!("  State: {} ({})", style("stale").yellow(), status.reason()),
        None => println!("  State: unused (no embedding provider)"),
    }

    Ok(())
}
