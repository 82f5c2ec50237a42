//! Answer generation seam.
//!
//! The service only needs a canned answer: the [`AnswerGenerator`] trait is
//! the boundary a real inference backend would plug into, and
//! [`CannedAnswerer`] is the deterministic implementation shipped here. It
//! echoes the retrieved sources and fixed token accounting so the rest of the
//! pipeline (metrics, message formatting) can be exercised end to end.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::retriever::ContextPayload;

/// The answer bundle produced for one query.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutput {
    pub answer: String,
    pub sources: Vec<String>,
    pub tokens_prompt: u64,
    pub tokens_completion: u64,
    pub model: String,
}

/// Produces an answer from retrieved context.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn answer(&self, context: &ContextPayload) -> Result<AnswerOutput>;
}

/// Deterministic stand-in for a real model.
pub struct CannedAnswerer;

#[async_trait]
impl AnswerGenerator for CannedAnswerer {
    async fn answer(&self, context: &ContextPayload) -> Result<AnswerOutput> {
        let sources = context
            .context
            .iter()
            .map(|snippet| snippet.source.clone())
            .collect();
        let answer = "Based on local documentation, here are the relevant steps:\n\
                      - Step 1: Review the matching guides listed under Sources.\n\
                      - Step 2: If the docs look stale, send `/ask-it reload`.\n\
                      - Step 3: Escalate to IT if the issue persists."
            .to_string();
        Ok(AnswerOutput {
            answer,
            sources,
            tokens_prompt: 100,
            tokens_completion: 60,
            model: "mock".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::ContextSnippet;

    #[tokio::test]
    async fn test_canned_answer_echoes_sources() {
        let context = ContextPayload {
            query: "reset okta mfa".to_string(),
            context: vec![
                ContextSnippet {
                    source: "docs/okta.md".to_string(),
                    excerpt: "okta okta".to_string(),
                },
                ContextSnippet {
                    source: "docs/mfa.md".to_string(),
                    excerpt: "mfa".to_string(),
                },
            ],
        };
        let out = CannedAnswerer.answer(&context).await.unwrap();
        assert_eq!(out.sources, vec!["docs/okta.md", "docs/mfa.md"]);
        assert_eq!(out.model, "mock");
        assert_eq!(out.tokens_prompt, 100);
        assert_eq!(out.tokens_completion, 60);
        assert!(out.answer.contains("relevant steps"));
    }

    #[tokio::test]
    async fn test_empty_context_still_answers() {
        let context = ContextPayload {
            query: "anything".to_string(),
            context: Vec::new(),
        };
        let out = CannedAnswerer.answer(&context).await.unwrap();
        assert!(out.sources.is_empty());
        assert!(!out.answer.is_empty());
    }
}
