//! Deterministic fakes for the external collaborators.
//!
//! Only compiled when running tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rig::embeddings::Embedding;

use crate::knowledge::completion::{CompletionFuture, CompletionProvider};
use crate::knowledge::content::{ContentSource, SourceFuture};
use crate::knowledge::core::config::KnowledgeConfig;
use crate::knowledge::core::document::{
    Chunk, Document, DocumentEmbedding, IndexedDocument, NewChunk, RetrievedChunk,
};
use crate::knowledge::core::errors::{KnowledgeError, KnowledgeResult};
use crate::knowledge::embedding::{EmbedFuture, Embedder};
use crate::knowledge::storage::{IndexStore, StoreFuture};

/// Dimensionality used by the test configuration.
pub const TEST_NDIMS: usize = 64;

/// Config sized for the hashing embedder with every pause disabled.
pub fn test_config() -> KnowledgeConfig {
    let mut config = KnowledgeConfig::default();
    config.embedding.ndims = TEST_NDIMS;
    config.indexing.chunk_pause_ms = 0;
    config.indexing.document_pause_ms = 0;
    config
}

/// Bag-of-words embedder: each lowercase alphanumeric token bumps one hashed dimension.
pub struct HashingEmbedder {
    ndims: usize,
    reported_ndims: usize,
    fail_on: Vec<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl HashingEmbedder {
    pub fn new(ndims: usize) -> Self {
        Self {
            ndims,
            reported_ndims: ndims,
            fail_on: Vec::new(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every call whose text contains `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on.push(needle.to_string());
        self
    }

    /// Claim a different dimensionality than the vectors actually produced.
    pub fn reporting_ndims(mut self, ndims: usize) -> Self {
        self.reported_ndims = ndims;
        self
    }

    /// Sleep before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(&self, text: &str) -> Vec<f64> {
        let mut vec = vec![0.01; self.ndims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for byte in token.to_lowercase().bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0100_0000_01b3);
            }
            let slot = usize::try_from(hash % self.ndims as u64).unwrap();
            vec[slot] += 1.0;
        }
        vec
    }
}

impl Embedder for HashingEmbedder {
    fn embed_text(&self, text: &str) -> EmbedFuture<'_, KnowledgeResult<Embedding>> {
        let text = text.to_string();
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_on.iter().any(|needle| text.contains(needle)) {
                return Err(KnowledgeError::Provider("embedding quota exceeded".to_string()));
            }
            Ok(Embedding {
                vec: self.vector(&text),
                document: text,
            })
        })
    }

    fn ndims(&self) -> usize {
        self.reported_ndims
    }
}

/// Completion provider replaying a fixed reply, or always failing.
pub struct ScriptedCompletion {
    reply: Option<String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl CompletionProvider for ScriptedCompletion {
    fn complete(&self, prompt: &str) -> CompletionFuture<'_, KnowledgeResult<String>> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self.reply.clone();
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            reply.ok_or_else(|| KnowledgeError::Provider("model unavailable".to_string()))
        })
    }
}

/// In-memory content source preserving insertion order.
#[derive(Default)]
pub struct MemorySource {
    documents: Mutex<Vec<(String, Document)>>,
}

impl MemorySource {
    pub fn with(documents: Vec<(&str, Document)>) -> Self {
        Self {
            documents: Mutex::new(
                documents
                    .into_iter()
                    .map(|(slug, doc)| (slug.to_string(), doc))
                    .collect(),
            ),
        }
    }

    pub fn put(&self, slug: &str, document: Document) {
        let mut documents = self.documents.lock().unwrap();
        if let Some(entry) = documents.iter_mut().find(|(s, _)| s == slug) {
            entry.1 = document;
        } else {
            documents.push((slug.to_string(), document));
        }
    }
}

impl ContentSource for MemorySource {
    fn get_document(&self, slug: &str) -> SourceFuture<'_, KnowledgeResult<Document>> {
        let found = self
            .documents
            .lock()
            .unwrap()
            .iter()
            .find(|(s, _)| s == slug)
            .map(|(_, doc)| doc.clone());
        let slug = slug.to_string();
        Box::pin(async move { found.ok_or(KnowledgeError::NotFound { slug }) })
    }

    fn list_documents(&self) -> SourceFuture<'_, KnowledgeResult<Vec<String>>> {
        let slugs = self
            .documents
            .lock()
            .unwrap()
            .iter()
            .map(|(s, _)| s.clone())
            .collect();
        Box::pin(async move { Ok(slugs) })
    }
}

/// Store returning fixed channel results; `None` makes that channel fail.
pub struct StaticStore {
    pub semantic: Option<Vec<RetrievedChunk>>,
    pub lexical: Option<Vec<RetrievedChunk>>,
}

impl IndexStore for StaticStore {
    fn upsert_document_embedding(
        &self,
        _row: DocumentEmbedding,
    ) -> StoreFuture<'_, KnowledgeResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn document_embedding(
        &self,
        _slug: &str,
    ) -> StoreFuture<'_, KnowledgeResult<Option<DocumentEmbedding>>> {
        Box::pin(async { Ok(None) })
    }

    fn list_document_embeddings(&self) -> StoreFuture<'_, KnowledgeResult<Vec<IndexedDocument>>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn replace_chunks(
        &self,
        _slug: &str,
        _chunks: Vec<NewChunk>,
    ) -> StoreFuture<'_, KnowledgeResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn chunks_for(&self, _slug: &str) -> StoreFuture<'_, KnowledgeResult<Vec<Chunk>>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn delete_document(&self, _slug: &str) -> StoreFuture<'_, KnowledgeResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn vector_search(
        &self,
        _vector: Vec<f32>,
        limit: usize,
    ) -> StoreFuture<'_, KnowledgeResult<Vec<RetrievedChunk>>> {
        let result = self
            .semantic
            .clone()
            .map(|mut rows| {
                rows.truncate(limit);
                rows
            })
            .ok_or_else(|| KnowledgeError::Provider("vector index offline".to_string()));
        Box::pin(async move { result })
    }

    fn lexical_search(
        &self,
        _query: &str,
        limit: usize,
    ) -> StoreFuture<'_, KnowledgeResult<Vec<RetrievedChunk>>> {
        let result = self
            .lexical
            .clone()
            .map(|mut rows| {
                rows.truncate(limit);
                rows
            })
            .ok_or_else(|| KnowledgeError::Provider("text index offline".to_string()));
        Box::pin(async move { result })
    }
}

/// Build a retrieved chunk for channel fixtures.
pub fn retrieved(slug: &str, content: &str, score: f64) -> RetrievedChunk {
    RetrievedChunk {
        slug: slug.to_string(),
        title: format!("Title {slug}"),
        content: content.to_string(),
        score,
    }
}
