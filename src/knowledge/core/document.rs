//! Documents, embeddings, chunks, and search results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A source document as supplied by the content source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Document title.
    pub title: String,
    /// Long-form body text (markdown headings are significant for chunking).
    pub body: String,
    /// Short summary.
    pub summary: String,
}

impl Document {
    /// Create a document.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            summary: summary.into(),
        }
    }

    /// Whole-document text used for the document-level embedding, cut to `max_chars`.
    #[must_use]
    pub fn embedding_text(&self, max_chars: usize) -> String {
        let full = format!("{}\n\n{}\n\n{}", self.title, self.summary, self.body);
        full.chars().take(max_chars).collect()
    }
}

/// Document-level embedding row, one per slug.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentEmbedding {
    /// Document slug (primary key).
    pub slug: String,
    /// Digest of `title + summary + body`.
    pub content_hash: String,
    /// Embedding of the truncated whole document.
    pub vector: Vec<f32>,
    /// Last successful (re)index.
    pub updated_at: DateTime<Utc>,
}

/// Inventory entry for an indexed document (no vector).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedDocument {
    /// Document slug.
    pub slug: String,
    /// Stored content hash.
    pub content_hash: String,
    /// Last successful (re)index.
    pub updated_at: DateTime<Utc>,
}

/// Metadata duplicated onto every chunk so results need no join.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Parent document title.
    pub title: String,
    /// Parent document slug.
    pub slug: String,
}

/// A chunk ready to be written to the store.
#[derive(Clone, Debug, PartialEq)]
pub struct NewChunk {
    /// Zero-based dense index within the document.
    pub chunk_index: usize,
    /// Chunk text, including the `DOCUMENT:` header line.
    pub content: String,
    /// Embedding of `content`.
    pub vector: Vec<f32>,
    /// Parent metadata.
    pub metadata: ChunkMetadata,
}

/// A stored chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    /// Parent document slug.
    pub slug: String,
    /// Zero-based dense index within the document.
    pub chunk_index: usize,
    /// Chunk text.
    pub content: String,
    /// Stored embedding of `content`.
    pub vector: Vec<f32>,
    /// Parent metadata.
    pub metadata: ChunkMetadata,
}

/// A chunk returned by one retrieval channel with that channel's score.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrievedChunk {
    /// Parent document slug.
    pub slug: String,
    /// Parent document title.
    pub title: String,
    /// Chunk text.
    pub content: String,
    /// Channel score: `1 - distance` for vectors, raw rank for full text.
    pub score: f64,
}

/// A final search result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Parent document slug.
    pub slug: String,
    /// Parent document title.
    pub title: String,
    /// Chunk text.
    pub content: String,
    /// Fused score of the chunk.
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_text_truncates_on_chars() {
        let doc = Document::new("Té", "ééééé", "s");
        let text = doc.embedding_text(6);
        assert_eq!(text.chars().count(), 6);
        assert!(text.starts_with("Té\n\ns"));
    }

    #[test]
    fn test_embedding_text_keeps_short_documents() {
        let doc = Document::new("Title", "Body", "Summary");
        assert_eq!(doc.embedding_text(5000), "Title\n\nSummary\n\nBody");
    }
}
