//! Knowledge-base search capability.
//!
//! The store itself lives outside this crate. The orchestrator only needs
//! `search`, and treats any error or timeout as "no augmentation".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One retrieved passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSnippet {
    pub title: String,
    pub excerpt: String,
}

impl KnowledgeSnippet {
    pub fn new(title: impl Into<String>, excerpt: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            excerpt: excerpt.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum KnowledgeError {
    #[error("knowledge base unavailable: {0}")]
    Unavailable(String),

    #[error("knowledge search timed out after {0}ms")]
    Timeout(u64),
}

/// Search over the business knowledge base.
#[async_trait]
pub trait KnowledgeBase: Send + Sync + 'static {
    /// Return up to `top_k` snippets relevant to `query`, best first.
    async fn search(&self, query: &str, top_k: usize)
        -> Result<Vec<KnowledgeSnippet>, KnowledgeError>;
}

/// Knowledge base with no content. Used when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoKnowledgeBase;

#[async_trait]
impl KnowledgeBase for NoKnowledgeBase {
    async fn search(
        &self,
        _query: &str,
        _top_k: usize,
    ) -> Result<Vec<KnowledgeSnippet>, KnowledgeError> {
        Ok(Vec::new())
    }
}

/// Fixed in-memory snippets, matched by case-insensitive word overlap.
///
/// Enough for demos and the CLI; real deployments plug in a vector store.
#[derive(Debug, Clone, Default)]
pub struct StaticKnowledgeBase {
    snippets: Vec<KnowledgeSnippet>,
}

impl StaticKnowledgeBase {
    pub fn new(snippets: Vec<KnowledgeSnippet>) -> Self {
        Self { snippets }
    }
}

#[async_trait]
impl KnowledgeBase for StaticKnowledgeBase {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<KnowledgeSnippet>, KnowledgeError> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .filter(|w| w.len() > 2)
            .collect();

        let mut scored: Vec<(usize, &KnowledgeSnippet)> = self
            .snippets
            .iter()
            .filter_map(|snippet| {
                let haystack = format!("{} {}", snippet.title, snippet.excerpt).to_lowercase();
                let score = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                (score > 0).then_some((score, snippet))
            })
            .collect();
        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, s)| s.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_knowledge_base_is_empty() {
        let results = NoKnowledgeBase.search("mortgage rates", 3).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_static_search_ranks_by_overlap() {
        let kb = StaticKnowledgeBase::new(vec![
            KnowledgeSnippet::new("Office hours", "Open weekdays 9 to 5."),
            KnowledgeSnippet::new("FHA loans", "FHA loans allow low down payments."),
            KnowledgeSnippet::new("Jumbo loans", "Jumbo loans exceed conforming limits."),
        ]);

        let results = kb.search("fha loans down payment", 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "FHA loans");
        assert_eq!(results[1].title, "Jumbo loans");
    }

    #[tokio::test]
    async fn test_static_search_respects_top_k() {
        let kb = StaticKnowledgeBase::new(vec![
            KnowledgeSnippet::new("a", "loan one"),
            KnowledgeSnippet::new("b", "loan two"),
        ]);
        assert_eq!(kb.search("loan", 1).await.unwrap().len(), 1);
        assert!(kb.search("loan", 0).await.unwrap().is_empty());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            KnowledgeError::Timeout(2000).to_string(),
            "knowledge search timed out after 2000ms"
        );
    }
}
