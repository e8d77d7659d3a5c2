//! LLM reranking of fused candidates.
//!
//! The model is asked for a JSON array of candidate ids. Output is parsed loosely and
//! anything unusable falls back to fused-score order.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use crate::knowledge::completion::CompletionProvider;
use crate::knowledge::core::config::RerankConfig;
use crate::knowledge::core::document::SearchHit;
use crate::knowledge::core::errors::{KnowledgeError, KnowledgeResult};
use crate::knowledge::retrieval::hybrid_search::FusedCandidate;

const CANDIDATE_SEPARATOR: &str = "\n\n---\n\n";

/// Outcome of parsing the model's ranking text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RankingParse {
    /// Candidate ids, most relevant first.
    Parsed(Vec<usize>),
    /// No integer array could be read.
    Unparsed,
}

/// Which ordering produced the final results. Only used for logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RankingSource {
    /// The model's ranking was applied.
    Reranked,
    /// Fused-score order was used.
    Fused,
}

/// Render candidates as `ID / TITLE / CONTENT` blocks with truncated content.
#[must_use]
pub fn format_candidates(candidates: &[FusedCandidate], snippet_chars: usize) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(id, candidate)| {
            let snippet: String = candidate.content.chars().take(snippet_chars).collect();
            format!("ID: {id}\nTITLE: {}\nCONTENT: {snippet}...", candidate.title)
        })
        .collect::<Vec<_>>()
        .join(CANDIDATE_SEPARATOR)
}

/// Build the single ranking instruction sent to the model.
#[must_use]
pub fn build_prompt(query: &str, candidates: &[FusedCandidate], snippet_chars: usize) -> String {
    format!(
        "Evaluate how relevant each passage below is to the search query.\n\
         Query: \"{query}\"\n\n\
         {passages}\n\n\
         Respond ONLY with a JSON array of the passage IDs ordered from most to least \
         relevant, for example [2, 0, 5].",
        passages = format_candidates(candidates, snippet_chars)
    )
}

/// Reorders candidates with a completion model.
pub struct Reranker {
    provider: Arc<dyn CompletionProvider>,
    snippet_chars: usize,
    array_pattern: Regex,
}

impl Reranker {
    /// Create a reranker.
    ///
    /// # Errors
    /// Returns an error if the id-array pattern cannot be compiled.
    pub fn new(provider: Arc<dyn CompletionProvider>, config: &RerankConfig) -> KnowledgeResult<Self> {
        let array_pattern = Regex::new(r"\[\s*\d+(?:\s*,\s*\d+)*\s*\]")
            .map_err(|err| KnowledgeError::InvalidConfig(err.to_string()))?;
        Ok(Self {
            provider,
            snippet_chars: config.snippet_chars,
            array_pattern,
        })
    }

    /// Find the first integer array in `text` and parse it.
    #[must_use]
    pub fn parse_ranking(&self, text: &str) -> RankingParse {
        let Some(found) = self.array_pattern.find(text) else {
            return RankingParse::Unparsed;
        };
        serde_json::from_str::<Vec<usize>>(found.as_str())
            .map_or(RankingParse::Unparsed, RankingParse::Parsed)
    }

    /// Order `candidates` for `query`, returning at most `limit` hits.
    ///
    /// Never fails: provider errors and unusable output fall back to the input order.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<FusedCandidate>,
        limit: usize,
    ) -> (Vec<SearchHit>, RankingSource) {
        if candidates.is_empty() || limit == 0 {
            return (Vec::new(), RankingSource::Fused);
        }

        let prompt = build_prompt(query, &candidates, self.snippet_chars);
        let text = match self.provider.complete(&prompt).await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "Ranking provider failed, using fused order");
                return (fused_order(candidates, limit), RankingSource::Fused);
            }
        };

        let order = match self.parse_ranking(&text) {
            RankingParse::Parsed(order) => order,
            RankingParse::Unparsed => {
                warn!("Ranking response had no id array, using fused order");
                return (fused_order(candidates, limit), RankingSource::Fused);
            }
        };

        match apply_ranking(&order, &candidates, limit) {
            Some(hits) => {
                debug!(?order, "Applied model ranking");
                (hits, RankingSource::Reranked)
            }
            None => {
                warn!(?order, "Ranking referenced unknown ids, using fused order");
                (fused_order(candidates, limit), RankingSource::Fused)
            }
        }
    }
}

/// Top `limit` candidates in their existing order.
#[must_use]
pub fn fused_order(candidates: Vec<FusedCandidate>, limit: usize) -> Vec<SearchHit> {
    candidates
        .into_iter()
        .take(limit)
        .map(FusedCandidate::into_hit)
        .collect()
}

/// Map the first `limit` distinct ids to hits; `None` if any of them is out of range.
fn apply_ranking(order: &[usize], candidates: &[FusedCandidate], limit: usize) -> Option<Vec<SearchHit>> {
    let mut seen = HashSet::new();
    let mut hits = Vec::with_capacity(limit.min(candidates.len()));
    for &id in order {
        if hits.len() == limit {
            break;
        }
        if !seen.insert(id) {
            continue;
        }
        hits.push(candidates.get(id)?.clone().into_hit());
    }
    Some(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::test_utils::ScriptedCompletion;

    fn candidate(slug: &str, content: &str, score: f64) -> FusedCandidate {
        FusedCandidate {
            slug: slug.to_string(),
            title: format!("Title {slug}"),
            content: content.to_string(),
            semantic_score: score,
            lexical_score: 0.0,
            combined_score: score,
        }
    }

    fn pool() -> Vec<FusedCandidate> {
        vec![
            candidate("a", "alpha", 0.9),
            candidate("b", "beta", 0.8),
            candidate("c", "gamma", 0.7),
        ]
    }

    fn reranker(provider: Arc<ScriptedCompletion>) -> Reranker {
        Reranker::new(provider, &RerankConfig::default()).unwrap()
    }

    fn slugs(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.slug.as_str()).collect()
    }

    #[test]
    fn test_parse_ranking_is_permissive() {
        let r = reranker(Arc::new(ScriptedCompletion::failing()));
        assert_eq!(r.parse_ranking("[2, 0, 1]"), RankingParse::Parsed(vec![2, 0, 1]));
        assert_eq!(
            r.parse_ranking("Sure! The order is [ 1,2 ] because..."),
            RankingParse::Parsed(vec![1, 2])
        );
        assert_eq!(
            r.parse_ranking("```json\n[3]\n``` and later [9, 9]"),
            RankingParse::Parsed(vec![3])
        );
        assert_eq!(r.parse_ranking("no ranking here"), RankingParse::Unparsed);
        assert_eq!(r.parse_ranking("[]"), RankingParse::Unparsed);
        assert_eq!(r.parse_ranking("[\"a\", \"b\"]"), RankingParse::Unparsed);
        assert_eq!(r.parse_ranking("[-1, 2]"), RankingParse::Unparsed);
    }

    #[test]
    fn test_format_candidates_truncates_content() {
        let long = candidate("a", &"x".repeat(500), 1.0);
        let text = format_candidates(&[long, candidate("b", "short", 0.5)], 300);
        let blocks: Vec<&str> = text.split(CANDIDATE_SEPARATOR).collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], format!("ID: 0\nTITLE: Title a\nCONTENT: {}...", "x".repeat(300)));
        assert_eq!(blocks[1], "ID: 1\nTITLE: Title b\nCONTENT: short...");
    }

    #[tokio::test]
    async fn test_rerank_applies_model_order() {
        let provider = Arc::new(ScriptedCompletion::replying("[2, 0, 1]"));
        let (hits, source) = reranker(provider.clone()).rerank("gamma", pool(), 2).await;
        assert_eq!(source, RankingSource::Reranked);
        assert_eq!(slugs(&hits), vec!["c", "a"]);
        assert!((hits[0].score - 0.7).abs() < f64::EPSILON);

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Query: \"gamma\""));
        assert!(prompts[0].contains("ID: 2\nTITLE: Title c"));
    }

    #[tokio::test]
    async fn test_rerank_skips_duplicates_and_allows_short_arrays() {
        let provider = Arc::new(ScriptedCompletion::replying("[1, 1, 2]"));
        let (hits, _) = reranker(provider).rerank("q", pool(), 3).await;
        assert_eq!(slugs(&hits), vec!["b", "c"]);

        let provider = Arc::new(ScriptedCompletion::replying("[2]"));
        let (hits, source) = reranker(provider).rerank("q", pool(), 3).await;
        assert_eq!(source, RankingSource::Reranked);
        assert_eq!(slugs(&hits), vec!["c"]);
    }

    #[tokio::test]
    async fn test_rerank_falls_back_on_bad_output() {
        for reply in ["[7, 0]", "I cannot rank these.", "[0, 99999999999999999999999]"] {
            let provider = Arc::new(ScriptedCompletion::replying(reply));
            let (hits, source) = reranker(provider).rerank("q", pool(), 2).await;
            assert_eq!(source, RankingSource::Fused, "reply: {reply}");
            assert_eq!(slugs(&hits), vec!["a", "b"]);
        }
    }

    #[tokio::test]
    async fn test_out_of_range_id_past_limit_is_ignored() {
        let provider = Arc::new(ScriptedCompletion::replying("[1, 7]"));
        let (hits, source) = reranker(provider).rerank("q", pool(), 1).await;
        assert_eq!(source, RankingSource::Reranked);
        assert_eq!(slugs(&hits), vec!["b"]);
    }

    #[tokio::test]
    async fn test_rerank_falls_back_on_provider_error() {
        let (hits, source) = reranker(Arc::new(ScriptedCompletion::failing()))
            .rerank("q", pool(), 2)
            .await;
        assert_eq!(source, RankingSource::Fused);
        assert_eq!(slugs(&hits), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_pool_skips_provider() {
        let provider = Arc::new(ScriptedCompletion::replying("[0]"));
        let (hits, _) = reranker(provider.clone()).rerank("q", Vec::new(), 3).await;
        assert!(hits.is_empty());
        assert!(provider.prompts().is_empty());
    }
}
