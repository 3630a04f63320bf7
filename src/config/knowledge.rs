//! Knowledge-base augmentation configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How chat prompts are augmented with knowledge-base snippets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Results requested from the search capability
    pub top_k: usize,
    /// Snippets rendered into the prompt
    pub max_snippets: usize,
    /// Characters kept per snippet excerpt
    pub max_snippet_chars: usize,
    /// Search deadline; on expiry the prompt is built without snippets
    pub timeout_ms: u64,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_snippets: 3,
            max_snippet_chars: 500,
            timeout_ms: 2000,
        }
    }
}

impl KnowledgeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
