//! Core knowledge types, configuration, and errors.

pub mod config;
pub mod document;
pub mod errors;

pub use config::{
    ChunkingConfig, EmbeddingConfig, IndexingConfig, KnowledgeConfig, LlmConfig, RerankConfig,
    RetrievalConfig, StorageConfig,
};
pub use document::{
    Chunk, ChunkMetadata, Document, DocumentEmbedding, IndexedDocument, NewChunk, RetrievedChunk,
    SearchHit,
};
pub use errors::{KnowledgeError, KnowledgeResult};
