//! Top-k document ranking and context assembly.
//!
//! [`retrieve`] scores every cached document against a query and keeps the
//! best few; [`compose`] turns that ranking into the payload handed to the
//! answer generator. The two steps read the cache independently, so a reload
//! landing between them can leave the ranking pointing at a key the new cache
//! no longer holds — that degrades to an empty excerpt rather than an error.

use serde::Serialize;

use crate::docstore::DocStore;
use crate::score;

/// One ranked document.
#[derive(Debug, Clone)]
pub struct RankedDoc {
    pub path: String,
    pub score: f64,
}

/// An excerpt of one retrieved document.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSnippet {
    pub source: String,
    pub excerpt: String,
}

/// The bundle handed to the answer generator.
#[derive(Debug, Clone, Serialize)]
pub struct ContextPayload {
    pub query: String,
    pub context: Vec<ContextSnippet>,
}

/// Ranks all cached documents against `query`.
///
/// Results are sorted descending by score; the sort is stable, so tied
/// documents keep the cache's enumeration order. At most `k` entries are
/// returned and zero-score entries are dropped.
pub fn retrieve(store: &DocStore, query: &str, k: usize) -> Vec<RankedDoc> {
    let docs = store.all();
    let tokens = score::tokenize(query);
    let mut ranked: Vec<RankedDoc> = docs
        .iter()
        .map(|(path, body)| RankedDoc {
            path: path.clone(),
            score: score::score(&tokens, body),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(k);
    ranked.retain(|doc| doc.score > 0.0);
    ranked
}

/// Builds the context payload for a ranking.
///
/// Excerpts are capped at `excerpt_chars` characters. Keys absent from the
/// cache by the time this runs yield an empty excerpt.
pub fn compose(
    store: &DocStore,
    ranked: &[RankedDoc],
    query: &str,
    excerpt_chars: usize,
) -> ContextPayload {
    let docs = store.all();
    let context = ranked
        .iter()
        .map(|doc| ContextSnippet {
            source: doc.path.clone(),
            excerpt: docs
                .get(&doc.path)
                .map(|body| body.chars().take(excerpt_chars).collect())
                .unwrap_or_default(),
        })
        .collect();
    ContextPayload {
        query: query.to_string(),
        context,
    }
}
