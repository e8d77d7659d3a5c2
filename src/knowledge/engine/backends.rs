//! Backend wiring for the knowledge engine.

use std::sync::Arc;

use tracing::info;

use crate::knowledge::completion::{CompletionProvider, OllamaCompletion};
use crate::knowledge::content::{ContentSource, SqliteContentSource};
use crate::knowledge::core::config::KnowledgeConfig;
use crate::knowledge::core::errors::KnowledgeResult;
use crate::knowledge::embedding::{Embedder, OllamaEmbedder};
use crate::knowledge::ingest::Indexer;
use crate::knowledge::retrieval::QueryEngine;
use crate::knowledge::storage::{IndexStore, SqliteIndexStore};

/// Backend dependencies for the knowledge engine.
pub struct KnowledgeBackends {
    /// Where documents are read from.
    pub source: Arc<dyn ContentSource>,
    /// Document and chunk index.
    pub store: Arc<dyn IndexStore>,
    /// Embedding model wrapper.
    pub embedder: Arc<dyn Embedder>,
    /// Ranking model; `None` disables reranking.
    pub ranker: Option<Arc<dyn CompletionProvider>>,
}

impl KnowledgeBackends {
    /// Build default `SQLite` and Ollama backends from config.
    ///
    /// # Errors
    /// Returns an error if any backend cannot be initialized.
    pub async fn sqlite(config: &KnowledgeConfig) -> KnowledgeResult<Self> {
        let source = Arc::new(SqliteContentSource::new(&config.storage).await?);
        let store = Arc::new(SqliteIndexStore::new(config).await?);
        let embedder = Arc::new(OllamaEmbedder::new(&config.embedding)?);
        let ranker: Option<Arc<dyn CompletionProvider>> = if config.reranking.enabled {
            Some(Arc::new(OllamaCompletion::new(&config.llm)?))
        } else {
            None
        };

        Ok(Self {
            source,
            store,
            embedder,
            ranker,
        })
    }
}

/// Indexer and query engine sharing one set of backends.
pub struct KnowledgeEngine {
    indexer: Indexer,
    query: QueryEngine,
}

impl KnowledgeEngine {
    /// Create an engine over explicit backends.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &KnowledgeConfig, backends: KnowledgeBackends) -> KnowledgeResult<Self> {
        config.validate()?;
        let indexer = Indexer::new(
            backends.source,
            Arc::clone(&backends.store),
            Arc::clone(&backends.embedder),
            config,
        )?;
        let query = QueryEngine::new(backends.store, backends.embedder, backends.ranker, config)?;
        info!(
            db = %config.storage.sqlite_path.display(),
            reranking = config.reranking.enabled,
            "Knowledge engine ready"
        );
        Ok(Self { indexer, query })
    }

    /// Create an engine using `SQLite` and Ollama backends.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or backends cannot be initialized.
    pub async fn from_config(config: &KnowledgeConfig) -> KnowledgeResult<Self> {
        config.validate()?;
        let backends = KnowledgeBackends::sqlite(config).await?;
        Self::new(config, backends)
    }

    /// Document indexer.
    #[must_use]
    pub const fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    /// Query engine.
    #[must_use]
    pub const fn query(&self) -> &QueryEngine {
        &self.query
    }
}
