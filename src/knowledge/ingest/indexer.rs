//! Document indexing: hash, embed, chunk, and persist.
//!
//! Failures are reported per document in [`IndexOutcome`] and never abort a batch.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::knowledge::content::ContentSource;
use crate::knowledge::core::config::{IndexingConfig, KnowledgeConfig};
use crate::knowledge::core::document::{ChunkMetadata, DocumentEmbedding, NewChunk};
use crate::knowledge::core::errors::KnowledgeResult;
use crate::knowledge::embedding::{Embedder, embed_vector};
use crate::knowledge::ingest::chunker::Chunker;
use crate::knowledge::ingest::hashing::content_hash;
use crate::knowledge::storage::IndexStore;

/// What happened to one document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexStatus {
    /// Document and chunks were (re)written.
    Indexed {
        /// Number of chunks stored.
        chunks: usize,
    },
    /// Content hash matched the stored one; nothing was written.
    Skipped,
    /// Indexing failed; stored rows are untouched.
    Failed,
}

/// Result of indexing a single document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IndexOutcome {
    /// Document slug.
    pub slug: String,
    /// Whether the call succeeded (indexed or skipped).
    pub success: bool,
    /// Human-readable summary or error message.
    pub message: String,
    /// Detailed status.
    pub status: IndexStatus,
}

impl IndexOutcome {
    fn indexed(slug: &str, chunks: usize) -> Self {
        Self {
            slug: slug.to_string(),
            success: true,
            message: format!("Indexed {chunks} chunks"),
            status: IndexStatus::Indexed { chunks },
        }
    }

    fn skipped(slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
            success: true,
            message: "Content unchanged".to_string(),
            status: IndexStatus::Skipped,
        }
    }

    fn failed(slug: &str, message: String) -> Self {
        Self {
            slug: slug.to_string(),
            success: false,
            message,
            status: IndexStatus::Failed,
        }
    }
}

/// Aggregate of a full reindex.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexAllReport {
    /// Documents attempted.
    pub processed: usize,
    /// Documents whose rows were rewritten.
    pub updated: usize,
    /// Documents skipped because their content was unchanged.
    pub skipped: usize,
    /// Documents that failed.
    pub errors: usize,
    /// Failed slugs with their error messages, in processing order.
    pub failed: Vec<(String, String)>,
}

/// Index state of one slug.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DocumentStatus {
    /// Whether a document embedding row exists.
    pub exists: bool,
    /// Stored content hash, if indexed.
    pub content_hash: Option<String>,
    /// Last successful index, if any.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Keeps the document and chunk index in sync with the content source.
pub struct Indexer {
    source: Arc<dyn ContentSource>,
    store: Arc<dyn IndexStore>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    config: IndexingConfig,
}

impl Indexer {
    /// Create an indexer over the given backends.
    ///
    /// # Errors
    /// Returns an error if the chunking config is invalid.
    pub fn new(
        source: Arc<dyn ContentSource>,
        store: Arc<dyn IndexStore>,
        embedder: Arc<dyn Embedder>,
        config: &KnowledgeConfig,
    ) -> KnowledgeResult<Self> {
        Ok(Self {
            source,
            store,
            embedder,
            chunker: Chunker::new(&config.chunking)?,
            config: config.indexing.clone(),
        })
    }

    /// Index state for every indexed slug and every source slug.
    ///
    /// # Errors
    /// Returns an error if the store or the content source cannot be read.
    pub async fn status(&self) -> KnowledgeResult<BTreeMap<String, DocumentStatus>> {
        let mut status: BTreeMap<String, DocumentStatus> = self
            .store
            .list_document_embeddings()
            .await?
            .into_iter()
            .map(|doc| {
                (
                    doc.slug,
                    DocumentStatus {
                        exists: true,
                        content_hash: Some(doc.content_hash),
                        updated_at: Some(doc.updated_at),
                    },
                )
            })
            .collect();

        for slug in self.source.list_documents().await? {
            status.entry(slug).or_insert(DocumentStatus {
                exists: false,
                content_hash: None,
                updated_at: None,
            });
        }
        Ok(status)
    }

    /// Index one document, skipping it when unchanged (if enabled).
    pub async fn index_one(&self, slug: &str) -> IndexOutcome {
        self.index_one_with(slug, false).await
    }

    /// Index one document; `force` re-embeds even when the content hash matches.
    pub async fn index_one_with(&self, slug: &str, force: bool) -> IndexOutcome {
        match self.try_index(slug, force).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    slug,
                    error = %err,
                    provider = err.is_provider_failure(),
                    "Indexing failed"
                );
                IndexOutcome::failed(slug, err.to_string())
            }
        }
    }

    async fn try_index(&self, slug: &str, force: bool) -> KnowledgeResult<IndexOutcome> {
        let document = self.source.get_document(slug).await?;
        let hash = content_hash(&document);

        if self.config.skip_unchanged && !force {
            let existing = self.store.document_embedding(slug).await?;
            if existing.is_some_and(|row| row.content_hash == hash) {
                debug!(slug, "Content unchanged, skipping");
                return Ok(IndexOutcome::skipped(slug));
            }
        }

        let doc_vector = embed_vector(
            self.embedder.as_ref(),
            &document.embedding_text(self.config.document_max_chars),
        )
        .await?;

        let metadata = ChunkMetadata {
            title: document.title.clone(),
            slug: slug.to_string(),
        };
        let texts = self.chunker.chunk(&document.title, &document.body);
        let mut chunks = Vec::with_capacity(texts.len());
        for (chunk_index, content) in texts.into_iter().enumerate() {
            let vector = embed_vector(self.embedder.as_ref(), &content).await?;
            debug!(slug, chunk_index, "Embedded chunk");
            chunks.push(NewChunk {
                chunk_index,
                content,
                vector,
                metadata: metadata.clone(),
            });
            let every = self.config.chunk_pause_every;
            if every > 0 && (chunk_index + 1) % every == 0 {
                pause(self.config.chunk_pause_ms).await;
            }
        }

        let count = chunks.len();
        self.store.replace_chunks(slug, chunks).await?;
        // Written last: a stored hash implies a complete chunk set.
        self.store
            .upsert_document_embedding(DocumentEmbedding {
                slug: slug.to_string(),
                content_hash: hash,
                vector: doc_vector,
                updated_at: Utc::now(),
            })
            .await?;

        info!(slug, chunks = count, "Indexed document");
        Ok(IndexOutcome::indexed(slug, count))
    }

    /// Index every source document sequentially.
    ///
    /// # Errors
    /// Returns an error only if the content source cannot list documents.
    pub async fn index_all(&self) -> KnowledgeResult<IndexAllReport> {
        self.index_all_with(false).await
    }

    /// Index every source document sequentially; `force` disables skipping.
    ///
    /// # Errors
    /// Returns an error only if the content source cannot list documents.
    pub async fn index_all_with(&self, force: bool) -> KnowledgeResult<IndexAllReport> {
        let slugs = self.source.list_documents().await?;
        let mut report = IndexAllReport::default();

        for (position, slug) in slugs.iter().enumerate() {
            if position > 0 {
                pause(self.config.document_pause_ms).await;
            }
            let outcome = self.index_one_with(slug, force).await;
            report.processed += 1;
            match outcome.status {
                IndexStatus::Indexed { .. } => report.updated += 1,
                IndexStatus::Skipped => report.skipped += 1,
                IndexStatus::Failed => {
                    report.errors += 1;
                    report.failed.push((outcome.slug, outcome.message));
                }
            }
        }

        info!(
            processed = report.processed,
            updated = report.updated,
            skipped = report.skipped,
            errors = report.errors,
            "Reindex finished"
        );
        Ok(report)
    }

    /// Remove a document and its chunks from the index. Idempotent.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn remove_one(&self, slug: &str) -> KnowledgeResult<()> {
        self.store.delete_document(slug).await?;
        info!(slug, "Removed document from index");
        Ok(())
    }
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
