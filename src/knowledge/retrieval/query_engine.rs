//! Query entry point: hybrid retrieval followed by optional reranking.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::knowledge::completion::CompletionProvider;
use crate::knowledge::core::config::KnowledgeConfig;
use crate::knowledge::core::document::SearchHit;
use crate::knowledge::core::errors::KnowledgeResult;
use crate::knowledge::embedding::Embedder;
use crate::knowledge::retrieval::hybrid_search::{HybridSearchConfig, HybridSearcher};
use crate::knowledge::retrieval::reranker::{RankingSource, Reranker, fused_order};
use crate::knowledge::storage::IndexStore;

/// Hybrid search over the chunk index.
pub struct QueryEngine {
    searcher: HybridSearcher,
    reranker: Option<Reranker>,
    default_limit: usize,
}

impl QueryEngine {
    /// Create a query engine. Reranking is off when `ranker` is `None` or disabled in config.
    ///
    /// # Errors
    /// Returns an error if the reranker cannot be built.
    pub fn new(
        store: Arc<dyn IndexStore>,
        embedder: Arc<dyn Embedder>,
        ranker: Option<Arc<dyn CompletionProvider>>,
        config: &KnowledgeConfig,
    ) -> KnowledgeResult<Self> {
        let reranker = match ranker {
            Some(provider) if config.reranking.enabled => {
                Some(Reranker::new(provider, &config.reranking)?)
            }
            _ => None,
        };
        Ok(Self {
            searcher: HybridSearcher::new(
                store,
                embedder,
                HybridSearchConfig::from(&config.retrieval),
            ),
            reranker,
            default_limit: config.retrieval.default_limit,
        })
    }

    /// Result count used when the caller does not pass one.
    #[must_use]
    pub const fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Search for `query`, returning at most `limit` hits best-first.
    ///
    /// # Errors
    /// Returns an error only if retrieval fails on both channels or the query
    /// embedding has the wrong dimensionality.
    pub async fn search(&self, query: &str, limit: usize) -> KnowledgeResult<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let candidates = self.searcher.retrieve(query).await?;
        let (hits, source) = match &self.reranker {
            Some(reranker) => reranker.rerank(query, candidates, limit).await,
            None => (fused_order(candidates, limit), RankingSource::Fused),
        };
        info!(results = hits.len(), ?source, "Search finished");
        Ok(hits)
    }

    /// Like [`Self::search`], bounded by `timeout`.
    ///
    /// Retrieval past the deadline yields no hits; reranking past the deadline falls
    /// back to fused order.
    ///
    /// # Errors
    /// Same as [`Self::search`].
    pub async fn search_with_timeout(
        &self,
        query: &str,
        limit: usize,
        timeout: Duration,
    ) -> KnowledgeResult<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let deadline = Instant::now() + timeout;

        let Ok(retrieved) = timeout_at(deadline, self.searcher.retrieve(query)).await else {
            warn!(?timeout, "Retrieval timed out");
            return Ok(Vec::new());
        };
        let candidates = retrieved?;

        let (hits, source) = match &self.reranker {
            Some(reranker) => {
                let fallback = candidates.clone();
                if let Ok(ranked) =
                    timeout_at(deadline, reranker.rerank(query, candidates, limit)).await
                {
                    ranked
                } else {
                    warn!(?timeout, "Reranking timed out, using fused order");
                    (fused_order(fallback, limit), RankingSource::Fused)
                }
            }
            None => (fused_order(candidates, limit), RankingSource::Fused),
        };
        debug!(results = hits.len(), ?source, "Search finished within deadline");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::core::document::Document;
    use crate::knowledge::core::errors::KnowledgeError;
    use crate::knowledge::ingest::Indexer;
    use crate::knowledge::storage::SqliteIndexStore;
    use crate::knowledge::test_utils::{
        HashingEmbedder, MemorySource, ScriptedCompletion, StaticStore, TEST_NDIMS, retrieved,
        test_config,
    };

    fn corpus() -> MemorySource {
        MemorySource::with(vec![
            (
                "a",
                Document::new(
                    "Raptor Engine",
                    "# Intro\nSuper Heavy uses 33 Raptor engines.\n# Specs\nMethalox staged combustion.",
                    "Methane rocket motor.",
                ),
            ),
            (
                "b",
                Document::new(
                    "Heat Shield",
                    "# Tiles\nHexagonal ceramic tiles protect the ship during reentry.\n# Repairs\nTiles are replaced between flights.",
                    "Thermal protection.",
                ),
            ),
        ])
    }

    async fn indexed_store() -> (Arc<SqliteIndexStore>, Arc<HashingEmbedder>) {
        let config = test_config();
        let store = Arc::new(SqliteIndexStore::open_in_memory(&config).await.unwrap());
        let embedder = Arc::new(HashingEmbedder::new(TEST_NDIMS));
        let indexer = Indexer::new(Arc::new(corpus()), store.clone(), embedder.clone(), &config).unwrap();
        let report = indexer.index_all().await.unwrap();
        assert_eq!(report.updated, 2);
        (store, embedder)
    }

    async fn engine(ranker: Option<Arc<dyn CompletionProvider>>) -> QueryEngine {
        let (store, embedder) = indexed_store().await;
        QueryEngine::new(store, embedder, ranker, &test_config()).unwrap()
    }

    #[tokio::test]
    async fn test_raptor_query_ranks_raptor_chunk_first() {
        let engine = engine(Some(Arc::new(ScriptedCompletion::failing()))).await;
        let hits = engine.search("raptor engines", 2).await.unwrap();
        assert!(!hits.is_empty() && hits.len() <= 2);
        assert_eq!(hits[0].slug, "a");
        assert!(hits[0].content.starts_with("DOCUMENT: Raptor Engine"));
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_failing_ranker_equals_fused_order() {
        let fused = engine(None).await.search("ceramic tiles", 3).await.unwrap();
        let fallback = engine(Some(Arc::new(ScriptedCompletion::failing())))
            .await
            .search("ceramic tiles", 3)
            .await
            .unwrap();
        assert!(!fused.is_empty());
        assert_eq!(fallback, fused);
    }

    #[tokio::test]
    async fn test_model_ranking_reorders_hits() {
        let fused = engine(None).await.search("raptor tiles", 2).await.unwrap();
        assert_eq!(fused.len(), 2);

        let ranked = engine(Some(Arc::new(ScriptedCompletion::replying("[1, 0]"))))
            .await
            .search("raptor tiles", 2)
            .await
            .unwrap();
        assert_eq!(ranked, vec![fused[1].clone(), fused[0].clone()]);
    }

    #[tokio::test]
    async fn test_reranking_disabled_in_config_skips_provider() {
        let (store, embedder) = indexed_store().await;
        let provider = Arc::new(ScriptedCompletion::replying("[1, 0]"));
        let mut config = test_config();
        config.reranking.enabled = false;
        let engine = QueryEngine::new(store, embedder, Some(provider.clone()), &config).unwrap();
        engine.search("raptor", 2).await.unwrap();
        assert!(provider.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_zero_limit_returns_nothing() {
        let engine = engine(None).await;
        assert!(engine.search("raptor", 0).await.unwrap().is_empty());
        assert_eq!(engine.default_limit(), 3);
    }

    #[tokio::test]
    async fn test_channel_failures() {
        let lexical_only = QueryEngine::new(
            Arc::new(StaticStore {
                semantic: None,
                lexical: Some(vec![retrieved("a", "raptor", 2.0), retrieved("b", "raptor too", 1.0)]),
            }),
            Arc::new(HashingEmbedder::new(TEST_NDIMS)),
            None,
            &test_config(),
        )
        .unwrap();
        let hits = lexical_only.search("raptor", 3).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!((hits[0].score - 0.6).abs() < 1e-9);

        let broken = QueryEngine::new(
            Arc::new(StaticStore {
                semantic: None,
                lexical: None,
            }),
            Arc::new(HashingEmbedder::new(TEST_NDIMS)),
            None,
            &test_config(),
        )
        .unwrap();
        let err = broken.search("raptor", 3).await.unwrap_err();
        assert!(matches!(err, KnowledgeError::Retrieval(_)));
    }

    #[tokio::test]
    async fn test_slow_ranker_times_out_to_fused_order() {
        let fused = engine(None).await.search("raptor", 2).await.unwrap();
        let slow = ScriptedCompletion::replying("[1, 0]").delayed(Duration::from_secs(30));
        let engine = engine(Some(Arc::new(slow))).await;
        let hits = engine
            .search_with_timeout("raptor", 2, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(hits, fused);
    }

    #[tokio::test]
    async fn test_slow_retrieval_times_out_empty() {
        let engine = QueryEngine::new(
            Arc::new(StaticStore {
                semantic: Some(vec![retrieved("a", "raptor", 0.9)]),
                lexical: Some(vec![retrieved("a", "raptor", 2.0)]),
            }),
            Arc::new(HashingEmbedder::new(TEST_NDIMS).delayed(Duration::from_secs(30))),
            None,
            &test_config(),
        )
        .unwrap();
        let hits = engine
            .search_with_timeout("raptor", 2, Duration::from_millis(50))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
