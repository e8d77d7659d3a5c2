//! Operator command line: index maintenance and ad-hoc search.
//!
//! Every command prints one JSON document on stdout. Logs go to stderr.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{Value, json};

use crate::knowledge::{KnowledgeConfig, KnowledgeEngine, KnowledgeResult};

/// Hybrid retrieval over a document corpus.
#[derive(Parser, Debug)]
#[command(name = "halldyll-retrieval")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON config file; defaults apply when omitted.
    #[arg(long, global = true, env = "HALLDYLL_CONFIG")]
    pub config: Option<PathBuf>,

    /// `SQLite` database holding documents and the index.
    #[arg(long, global = true, env = "HALLDYLL_DB")]
    pub db: Option<PathBuf>,

    /// Ollama base URL for embeddings and ranking.
    #[arg(long, global = true, env = "HALLDYLL_OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Show index state for every known document.
    Status,
    /// Index a single document.
    Index {
        /// Document slug.
        slug: String,
        /// Re-embed even if the content is unchanged.
        #[arg(long)]
        force: bool,
    },
    /// Index every document in the content source.
    IndexAll {
        /// Re-embed even if the content is unchanged.
        #[arg(long)]
        force: bool,
    },
    /// Remove a document from the index.
    Remove {
        /// Document slug.
        slug: String,
    },
    /// Run a hybrid search.
    Search {
        /// Query text.
        query: String,
        /// Maximum number of results (config default when omitted).
        #[arg(long, short)]
        limit: Option<usize>,
        /// Give up after this many milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

/// Result of a command: JSON payload and whether it succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    /// Payload printed on stdout.
    pub json: Value,
    /// `false` maps to a failing exit code.
    pub success: bool,
}

impl CommandOutput {
    fn ok(json: Value) -> Self {
        Self {
            json,
            success: true,
        }
    }
}

impl Cli {
    /// Load the config file (if any) and apply command-line overrides.
    ///
    /// # Errors
    /// Returns an error if the config file cannot be loaded or the result is invalid.
    pub fn resolve_config(&self) -> KnowledgeResult<KnowledgeConfig> {
        let mut config = match &self.config {
            Some(path) => KnowledgeConfig::load(path)?,
            None => KnowledgeConfig::default(),
        };
        if let Some(db) = &self.db {
            config.storage.sqlite_path.clone_from(db);
        }
        if let Some(url) = &self.ollama_url {
            config.embedding.base_url = Some(url.clone());
            config.llm.base_url = Some(url.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

/// Run one command against an engine.
///
/// # Errors
/// Returns an error if the store or content source fails, or if search fails on
/// both retrieval channels. Per-document indexing failures are reported in the output.
pub async fn execute(engine: &KnowledgeEngine, command: &Commands) -> KnowledgeResult<CommandOutput> {
    match command {
        Commands::Status => {
            let status = engine.indexer().status().await?;
            Ok(CommandOutput::ok(serde_json::to_value(status)?))
        }
        Commands::Index { slug, force } => {
            let outcome = engine.indexer().index_one_with(slug, *force).await;
            Ok(CommandOutput {
                success: outcome.success,
                json: serde_json::to_value(outcome)?,
            })
        }
        Commands::IndexAll { force } => {
            let report = engine.indexer().index_all_with(*force).await?;
            Ok(CommandOutput {
                success: report.errors == 0,
                json: serde_json::to_value(report)?,
            })
        }
        Commands::Remove { slug } => {
            engine.indexer().remove_one(slug).await?;
            Ok(CommandOutput::ok(json!({ "slug": slug, "removed": true })))
        }
        Commands::Search {
            query,
            limit,
            timeout_ms,
        } => {
            let searcher = engine.query();
            let limit = limit.unwrap_or_else(|| searcher.default_limit());
            let hits = match timeout_ms {
                Some(ms) => {
                    searcher
                        .search_with_timeout(query, limit, Duration::from_millis(*ms))
                        .await?
                }
                None => searcher.search(query, limit).await?,
            };
            Ok(CommandOutput::ok(serde_json::to_value(hits)?))
        }
    }
}
