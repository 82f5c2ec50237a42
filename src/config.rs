use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level service configuration, parsed from `askdesk.toml`.
///
/// Every section and field has a default, so a missing config file yields a
/// fully usable development configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub docs: DocsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub slack: SlackConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocsConfig {
    /// Directory scanned (non-recursively) for documents.
    #[serde(default = "default_docs_dir")]
    pub dir: PathBuf,
    /// File-name globs eligible for the cache, matched case-insensitively.
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            dir: default_docs_dir(),
            include_globs: default_include_globs(),
        }
    }
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("docs")
}
fn default_include_globs() -> Vec<String> {
    ["*.md", "*.txt", "*.json", "*.csv"]
        .iter()
        .map(|g| g.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// How many documents a query retrieves.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Excerpt length cap, in characters.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_excerpt_chars() -> usize {
    800
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// Bucket capacity: the maximum burst per identity.
    #[serde(default = "default_capacity")]
    pub capacity: f64,
    /// Tokens regained per second.
    #[serde(default = "default_refill_rate")]
    pub refill_rate: f64,
    /// Connection URL of the shared bucket store (e.g. `sqlite:data/buckets.sqlite`).
    /// Unset means process-local buckets.
    #[serde(default)]
    pub store_url: Option<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_rate: default_refill_rate(),
            store_url: None,
        }
    }
}

fn default_capacity() -> f64 {
    5.0
}
fn default_refill_rate() -> f64 {
    0.5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    /// Signing secret for request verification. Overridden by the
    /// `SLACK_SIGNING_SECRET` environment variable when set.
    #[serde(default = "default_signing_secret")]
    pub signing_secret: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            signing_secret: default_signing_secret(),
        }
    }
}

fn default_signing_secret() -> String {
    "dev-secret".to_string()
}

impl Config {
    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Config> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("parsing config file {}", path.display()))?
        } else {
            Config::default()
        };

        if let Ok(secret) = std::env::var("SLACK_SIGNING_SECRET") {
            if !secret.is_empty() {
                config.slack.signing_secret = secret;
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.docs.dir, PathBuf::from("docs"));
        assert_eq!(config.docs.include_globs.len(), 4);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.excerpt_chars, 800);
        assert_eq!(config.rate_limit.capacity, 5.0);
        assert_eq!(config.rate_limit.refill_rate, 0.5);
        assert!(config.rate_limit.store_url.is_none());
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.slack.signing_secret, "dev-secret");
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let raw = r#"
[docs]
dir = "kb"

[rate_limit]
capacity = 10.0
store_url = "sqlite:data/buckets.sqlite"
"#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.docs.dir, PathBuf::from("kb"));
        // untouched sections keep their defaults
        assert_eq!(config.docs.include_globs.len(), 4);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.rate_limit.capacity, 10.0);
        assert_eq!(config.rate_limit.refill_rate, 0.5);
        assert_eq!(
            config.rate_limit.store_url.as_deref(),
            Some("sqlite:data/buckets.sqlite")
        );
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let config = Config::load(Path::new("/nonexistent/askdesk.toml")).unwrap();
        assert_eq!(config.retrieval.top_k, 3);
    }
}
