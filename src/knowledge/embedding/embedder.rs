//! Embedding model wrapper for Rig + Ollama.

use std::future::Future;
use std::pin::Pin;

use reqwest::Client as ReqwestClient;
use rig::client::{EmbeddingsClient, Nothing};
use rig::embeddings::{Embedding, EmbeddingModel};
use rig::providers::ollama;

use crate::knowledge::core::config::EmbeddingConfig;
use crate::knowledge::core::errors::{KnowledgeError, KnowledgeResult};

/// Boxed future type for embedder operations.
pub type EmbedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait abstraction over embedding models.
///
/// The same model must serve document, chunk, and query embeddings.
pub trait Embedder: Send + Sync {
    /// Embed a single text string.
    ///
    /// # Errors
    /// Returns an error if the embedding request fails.
    fn embed_text(&self, text: &str) -> EmbedFuture<'_, KnowledgeResult<Embedding>>;
    /// Return embedding dimensionality.
    fn ndims(&self) -> usize;
}

/// Embed `text` and convert it to a store-ready `f32` vector of `ndims` length.
///
/// # Errors
/// Returns an error if the provider fails or returns a vector of the wrong size.
pub async fn embed_vector(embedder: &dyn Embedder, text: &str) -> KnowledgeResult<Vec<f32>> {
    let embedding = embedder.embed_text(text).await?;
    let expected = embedder.ndims();
    if embedding.vec.len() != expected {
        return Err(KnowledgeError::DimensionMismatch {
            expected,
            actual: embedding.vec.len(),
        });
    }
    Ok(to_f32(&embedding.vec))
}

#[allow(clippy::cast_possible_truncation)] // sqlite-vec stores float32
fn to_f32(values: &[f64]) -> Vec<f32> {
    values.iter().map(|v| *v as f32).collect()
}

type OllamaEmbeddingModel = ollama::EmbeddingModel<ReqwestClient>;

/// Ollama embedder using Rig provider.
#[derive(Clone)]
pub struct OllamaEmbedder {
    model: OllamaEmbeddingModel,
    ndims: usize,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder from config.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn new(config: &EmbeddingConfig) -> KnowledgeResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(KnowledgeError::from)?;
        let model = client.embedding_model_with_ndims(config.model.clone(), config.ndims);
        Ok(Self {
            model,
            ndims: config.ndims,
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn embed_text(&self, text: &str) -> EmbedFuture<'_, KnowledgeResult<Embedding>> {
        let text = text.to_string();
        Box::pin(async move {
            self.model
                .embed_text(&text)
                .await
                .map_err(KnowledgeError::Embedding)
        })
    }

    fn ndims(&self) -> usize {
        self.ndims
    }
}
