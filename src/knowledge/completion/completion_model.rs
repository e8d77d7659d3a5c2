//! Completion provider used to rank retrieved candidates.

use std::future::Future;
use std::pin::Pin;

use reqwest::Client as ReqwestClient;
use rig::client::CompletionClient;
use rig::completion::CompletionModel;
use rig::message::AssistantContent;
use rig::providers::ollama;

use crate::knowledge::core::config::LlmConfig;
use crate::knowledge::core::errors::{KnowledgeError, KnowledgeResult};

/// Boxed future type for completion operations.
pub type CompletionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Free-text completion. No structured-output guarantee.
pub trait CompletionProvider: Send + Sync {
    /// Complete a prompt and return the raw assistant text.
    ///
    /// # Errors
    /// Returns an error if the provider call fails.
    fn complete(&self, prompt: &str) -> CompletionFuture<'_, KnowledgeResult<String>>;
}

const RANKING_PREAMBLE: &str =
    "You are a search relevance judge. Answer only with what is asked, without commentary.";

/// Ollama completion provider using Rig.
pub struct OllamaCompletion {
    model: ollama::CompletionModel,
    temperature: f64,
    max_tokens: Option<u64>,
}

impl OllamaCompletion {
    /// Create a new completion provider from config.
    ///
    /// # Errors
    /// Returns an error if the Ollama client cannot be built.
    pub fn new(config: &LlmConfig) -> KnowledgeResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(rig::client::Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(KnowledgeError::from)?;
        let model = client.completion_model(config.model.clone());
        Ok(Self {
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

impl CompletionProvider for OllamaCompletion {
    fn complete(&self, prompt: &str) -> CompletionFuture<'_, KnowledgeResult<String>> {
        let prompt = prompt.to_string();
        Box::pin(async move {
            let request = self
                .model
                .completion_request(prompt)
                .preamble(RANKING_PREAMBLE.to_string())
                .temperature(self.temperature)
                .max_tokens_opt(self.max_tokens)
                .build();

            let response = self.model.completion(request).await?;
            Ok(extract_text(&response.choice))
        })
    }
}

fn extract_text(choice: &rig::OneOrMany<AssistantContent>) -> String {
    let mut out = String::new();
    for content in choice.iter() {
        if let AssistantContent::Text(text) = content {
            out.push_str(&text.text);
        }
    }
    out
}
