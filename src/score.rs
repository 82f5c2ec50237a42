//! Keyword relevance scoring.
//!
//! Scoring is deliberately simple: per query token, count non-overlapping
//! occurrences in the lowercased document text, plus a half-weight bonus for
//! occurrences inside the head of the document. Early matches usually mean
//! the document is *about* the topic rather than mentioning it in passing.

/// Characters of the document head that earn the early-match bonus.
pub const HEAD_CHARS: usize = 400;

/// Weight applied to head occurrences on top of their base count.
pub const HEAD_WEIGHT: f64 = 0.5;

/// Splits a query into lowercase tokens: runs of ASCII alphanumerics and
/// underscores. Everything else is a separator.
pub fn tokenize(query: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in query.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            current.push(ch.to_ascii_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Scores a document against pre-tokenized query terms.
///
/// Occurrence counting is substring-based, not word-boundary-based, so the
/// token `auth` matches inside `authentication`. An empty token list scores 0.
pub fn score(tokens: &[String], text: &str) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let body = text.to_lowercase();
    let head: String = body.chars().take(HEAD_CHARS).collect();

    let base: usize = tokens.iter().map(|t| body.matches(t.as_str()).count()).sum();
    let early: usize = tokens.iter().map(|t| head.matches(t.as_str()).count()).sum();

    base as f64 + early as f64 * HEAD_WEIGHT
}
