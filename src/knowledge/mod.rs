//! Hybrid retrieval and reranking over a document corpus.
//!
//! This module is organized into:
//! - `core`: Configuration, errors, and document types
//! - `content`: Content source abstraction and `SQLite` implementation
//! - `embedding`: Embedding model abstraction and Ollama implementation
//! - `completion`: Ranking model abstraction and Ollama implementation
//! - `ingest`: Chunking, content hashing, and indexing
//! - `storage`: Document/chunk index with vector and full-text search
//! - `retrieval`: Hybrid search, score fusion, and reranking
//! - `engine`: Backend wiring

pub mod completion;
pub mod content;
pub mod core;
pub mod embedding;
pub mod engine;
pub mod ingest;
pub mod retrieval;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_utils;

pub use completion::{CompletionFuture, CompletionProvider, OllamaCompletion};
pub use content::{ContentSource, SourceFuture, SqliteContentSource};
pub use self::core::{
    Chunk, ChunkMetadata, ChunkingConfig, Document, DocumentEmbedding, EmbeddingConfig,
    IndexedDocument, IndexingConfig, KnowledgeConfig, KnowledgeError, KnowledgeResult, LlmConfig,
    NewChunk, RerankConfig, RetrievalConfig, RetrievedChunk, SearchHit, StorageConfig,
};
pub use embedding::{EmbedFuture, Embedder, OllamaEmbedder, embed_vector};
pub use engine::{KnowledgeBackends, KnowledgeEngine};
pub use ingest::{
    Chunker, DocumentStatus, IndexAllReport, IndexOutcome, IndexStatus, Indexer, content_hash,
    document_header,
};
pub use retrieval::{
    FusedCandidate, HybridSearchConfig, HybridSearcher, QueryEngine, RankingParse, RankingSource,
    Reranker, fuse,
};
pub use storage::{IndexStore, SqliteIndexStore, StoreFuture, build_match_query, init_sqlite_vec_extension};
