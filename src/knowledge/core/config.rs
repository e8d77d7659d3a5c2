//! Configuration for the knowledge subsystem.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::knowledge::core::errors::{KnowledgeError, KnowledgeResult};

/// Top-level configuration for indexing and search.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Storage settings.
    pub storage: StorageConfig,
    /// Embedding model settings.
    pub embedding: EmbeddingConfig,
    /// Completion model settings (used for reranking).
    pub llm: LlmConfig,
    /// Chunking settings.
    pub chunking: ChunkingConfig,
    /// Indexing pipeline settings.
    pub indexing: IndexingConfig,
    /// Hybrid retrieval settings.
    pub retrieval: RetrievalConfig,
    /// Reranking settings.
    pub reranking: RerankConfig,
}

impl KnowledgeConfig {
    /// Load configuration from a JSON file. Missing sections use defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: impl AsRef<Path>) -> KnowledgeResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> KnowledgeResult<()> {
        if self.chunking.chunk_size == 0 {
            return Err(KnowledgeError::InvalidConfig(
                "chunking.chunk_size must be > 0".to_string(),
            ));
        }

        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(KnowledgeError::InvalidConfig(
                "chunking.overlap must be smaller than chunking.chunk_size".to_string(),
            ));
        }

        if self.embedding.ndims == 0 {
            return Err(KnowledgeError::InvalidConfig(
                "embedding.ndims must be > 0".to_string(),
            ));
        }

        if self.indexing.document_max_chars == 0 {
            return Err(KnowledgeError::InvalidConfig(
                "indexing.document_max_chars must be > 0".to_string(),
            ));
        }

        if self.retrieval.semantic_weight < 0.0 || self.retrieval.lexical_weight < 0.0 {
            return Err(KnowledgeError::InvalidConfig(
                "retrieval weights must be >= 0".to_string(),
            ));
        }

        if self.retrieval.semantic_candidates == 0 && self.retrieval.lexical_candidates == 0 {
            return Err(KnowledgeError::InvalidConfig(
                "at least one retrieval channel must request candidates".to_string(),
            ));
        }

        if self.retrieval.rerank_pool == 0 {
            return Err(KnowledgeError::InvalidConfig(
                "retrieval.rerank_pool must be > 0".to_string(),
            ));
        }

        for table in [
            &self.storage.documents_table,
            &self.storage.embeddings_table,
            &self.storage.chunks_table,
        ] {
            if !is_valid_identifier(table) {
                return Err(KnowledgeError::InvalidConfig(format!(
                    "invalid table name: {table}"
                )));
            }
        }

        if let Some(base_url) = &self.embedding.base_url {
            Url::parse(base_url)?;
        }

        if let Some(base_url) = &self.llm.base_url {
            Url::parse(base_url)?;
        }

        Ok(())
    }
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Table the content source reads documents from.
    pub documents_table: String,
    /// Document-level embedding table.
    pub embeddings_table: String,
    /// Chunk-level embedding table.
    pub chunks_table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("knowledge.sqlite"),
            documents_table: "documents".to_string(),
            embeddings_table: "document_embeddings".to_string(),
            chunks_table: "document_chunks".to_string(),
        }
    }
}

/// Embedding model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama embedding model name.
    pub model: String,
    /// Embedding vector dimensions.
    pub ndims: usize,
    /// Optional custom base URL.
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            ndims: 768,
            base_url: None,
        }
    }
}

/// Completion model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama completion model name.
    pub model: String,
    /// Temperature for generation.
    pub temperature: f64,
    /// Optional max tokens.
    pub max_tokens: Option<u64>,
    /// Optional custom base URL.
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "ministral-3:8b-instruct-2512-q8_0".to_string(),
            temperature: 0.0,
            max_tokens: None,
            base_url: None,
        }
    }
}

/// Chunking settings. Sizes are character counts, not tokens.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters, header included.
    pub chunk_size: usize,
    /// Characters carried over between force-split windows.
    pub overlap: usize,
    /// Accumulate consecutive sections into one chunk while they fit.
    pub merge_sections: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
            merge_sections: false,
        }
    }
}

/// Indexing pipeline settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Characters of the whole document used for the document-level embedding.
    pub document_max_chars: usize,
    /// Pause after this many chunk embeddings within one document.
    pub chunk_pause_every: usize,
    /// Pause length between chunk batches, in milliseconds.
    pub chunk_pause_ms: u64,
    /// Pause length between documents during a full reindex, in milliseconds.
    pub document_pause_ms: u64,
    /// Skip documents whose content hash matches the stored one.
    pub skip_unchanged: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            document_max_chars: 5000,
            chunk_pause_every: 5,
            chunk_pause_ms: 200,
            document_pause_ms: 500,
            skip_unchanged: true,
        }
    }
}

/// Hybrid retrieval settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Weight for the semantic (vector) channel.
    pub semantic_weight: f64,
    /// Weight for the lexical (full-text) channel.
    pub lexical_weight: f64,
    /// Candidates requested from the vector channel.
    pub semantic_candidates: usize,
    /// Candidates requested from the lexical channel.
    pub lexical_candidates: usize,
    /// Fused candidates handed to the reranker.
    pub rerank_pool: usize,
    /// Result count when the caller does not give one.
    pub default_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            lexical_weight: 0.3,
            semantic_candidates: 15,
            lexical_candidates: 15,
            rerank_pool: 10,
            default_limit: 3,
        }
    }
}

/// Reranking settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    /// Whether the completion model reorders fused candidates.
    pub enabled: bool,
    /// Characters of each candidate shown to the model.
    pub snippet_chars: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            snippet_chars: 300,
        }
    }
}
