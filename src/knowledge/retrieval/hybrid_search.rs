//! Hybrid retrieval combining vector similarity with full-text rank.
//!
//! Both channels are queried concurrently, joined on `(slug, content)` and scored with
//! a fixed weighted sum. A chunk seen by only one channel scores 0 on the other.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::knowledge::core::config::RetrievalConfig;
use crate::knowledge::core::document::{RetrievedChunk, SearchHit};
use crate::knowledge::core::errors::{KnowledgeError, KnowledgeResult};
use crate::knowledge::embedding::{Embedder, embed_vector};
use crate::knowledge::storage::IndexStore;

/// Configuration for hybrid search.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridSearchConfig {
    /// Weight of the vector similarity score.
    pub semantic_weight: f64,
    /// Weight of the full-text rank score.
    pub lexical_weight: f64,
    /// Candidates requested from the vector channel.
    pub semantic_candidates: usize,
    /// Candidates requested from the full-text channel.
    pub lexical_candidates: usize,
    /// Fused candidates kept for reranking.
    pub rerank_pool: usize,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for HybridSearchConfig {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            semantic_weight: config.semantic_weight,
            lexical_weight: config.lexical_weight,
            semantic_candidates: config.semantic_candidates,
            lexical_candidates: config.lexical_candidates,
            rerank_pool: config.rerank_pool,
        }
    }
}

/// A chunk after fusion, with both channel scores.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    /// Parent document slug.
    pub slug: String,
    /// Parent document title.
    pub title: String,
    /// Chunk text.
    pub content: String,
    /// `1 - distance`, or 0 if the vector channel missed it.
    pub semantic_score: f64,
    /// Raw full-text rank, or 0 if the full-text channel missed it.
    pub lexical_score: f64,
    /// Weighted sum of both scores.
    pub combined_score: f64,
}

impl FusedCandidate {
    /// Convert into a caller-facing hit scored by the fused score.
    #[must_use]
    pub fn into_hit(self) -> SearchHit {
        SearchHit {
            slug: self.slug,
            title: self.title,
            content: self.content,
            score: self.combined_score,
        }
    }
}

/// Full outer join of both channels, sorted best-first and cut to the rerank pool.
///
/// Ties keep first-seen order (vector channel first), so the result is deterministic.
#[must_use]
pub fn fuse(
    semantic: Vec<RetrievedChunk>,
    lexical: Vec<RetrievedChunk>,
    config: &HybridSearchConfig,
) -> Vec<FusedCandidate> {
    let mut fused: Vec<FusedCandidate> = Vec::with_capacity(semantic.len() + lexical.len());
    let mut positions: HashMap<(String, String), usize> = HashMap::new();

    for chunk in semantic {
        let key = (chunk.slug.clone(), chunk.content.clone());
        if let Some(&pos) = positions.get(&key) {
            let entry = &mut fused[pos];
            entry.semantic_score = entry.semantic_score.max(chunk.score);
            continue;
        }
        positions.insert(key, fused.len());
        fused.push(FusedCandidate {
            slug: chunk.slug,
            title: chunk.title,
            content: chunk.content,
            semantic_score: chunk.score,
            lexical_score: 0.0,
            combined_score: 0.0,
        });
    }

    for chunk in lexical {
        let key = (chunk.slug.clone(), chunk.content.clone());
        if let Some(&pos) = positions.get(&key) {
            let entry = &mut fused[pos];
            entry.lexical_score = entry.lexical_score.max(chunk.score);
            continue;
        }
        positions.insert(key, fused.len());
        fused.push(FusedCandidate {
            slug: chunk.slug,
            title: chunk.title,
            content: chunk.content,
            semantic_score: 0.0,
            lexical_score: chunk.score,
            combined_score: 0.0,
        });
    }

    for candidate in &mut fused {
        candidate.combined_score = config.semantic_weight.mul_add(
            candidate.semantic_score,
            config.lexical_weight * candidate.lexical_score,
        );
    }

    fused.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
    fused.truncate(config.rerank_pool);
    fused
}

/// Runs both retrieval channels and fuses their results.
pub struct HybridSearcher {
    store: Arc<dyn IndexStore>,
    embedder: Arc<dyn Embedder>,
    config: HybridSearchConfig,
}

impl HybridSearcher {
    /// Create a new hybrid searcher.
    #[must_use]
    pub fn new(
        store: Arc<dyn IndexStore>,
        embedder: Arc<dyn Embedder>,
        config: HybridSearchConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Search configuration.
    #[must_use]
    pub const fn config(&self) -> &HybridSearchConfig {
        &self.config
    }

    /// Retrieve and fuse candidates for `query`.
    ///
    /// A failing channel is logged and treated as empty.
    ///
    /// # Errors
    /// Returns an error if both channels fail, or if the query embedding has the
    /// wrong dimensionality.
    pub async fn retrieve(&self, query: &str) -> KnowledgeResult<Vec<FusedCandidate>> {
        let (semantic, lexical) = tokio::join!(self.semantic(query), self.lexical(query));

        let (semantic, lexical) = match (semantic, lexical) {
            (Err(err @ KnowledgeError::DimensionMismatch { .. }), _) => return Err(err),
            (Err(sem), Err(lex)) => {
                return Err(KnowledgeError::Retrieval(format!(
                    "semantic channel: {sem}; lexical channel: {lex}"
                )));
            }
            (Err(err), Ok(lexical)) => {
                warn!(error = %err, "Semantic channel failed, using lexical results only");
                (Vec::new(), lexical)
            }
            (Ok(semantic), Err(err)) => {
                warn!(error = %err, "Lexical channel failed, using semantic results only");
                (semantic, Vec::new())
            }
            (Ok(semantic), Ok(lexical)) => (semantic, lexical),
        };

        debug!(
            semantic = semantic.len(),
            lexical = lexical.len(),
            "Retrieved channel candidates"
        );
        Ok(fuse(semantic, lexical, &self.config))
    }

    async fn semantic(&self, query: &str) -> KnowledgeResult<Vec<RetrievedChunk>> {
        if self.config.semantic_candidates == 0 {
            return Ok(Vec::new());
        }
        let vector = embed_vector(self.embedder.as_ref(), query).await?;
        self.store
            .vector_search(vector, self.config.semantic_candidates)
            .await
    }

    async fn lexical(&self, query: &str) -> KnowledgeResult<Vec<RetrievedChunk>> {
        if self.config.lexical_candidates == 0 {
            return Ok(Vec::new());
        }
        self.store
            .lexical_search(query, self.config.lexical_candidates)
            .await
    }
}
