//! Hybrid retrieval, fusion, and reranking.

pub mod hybrid_search;
pub mod query_engine;
pub mod reranker;

pub use hybrid_search::{FusedCandidate, HybridSearchConfig, HybridSearcher, fuse};
pub use query_engine::QueryEngine;
pub use reranker::{
    RankingParse, RankingSource, Reranker, build_prompt, format_candidates, fused_order,
};
