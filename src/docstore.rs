//! In-memory document cache.
//!
//! Loads eligible files from a configured directory into a path-keyed map of
//! decoded text. The cache fills lazily on first read and is replaced
//! atomically on [`DocStore::reload`]: the fresh map is built entirely off to
//! the side, then published with a single reference swap, so concurrent
//! readers always observe a complete mapping.
//!
//! Failure policy for the scan is skip-and-continue: a missing directory
//! yields an empty cache, and an unreadable or malformed file drops that one
//! entry without aborting the rest of the scan.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::DocsConfig;

/// Snapshot of the cache: document path → decoded text.
///
/// A `BTreeMap` keeps enumeration order lexicographic by path, which makes
/// ranking tie-breaks deterministic.
pub type DocMap = BTreeMap<String, String>;

/// Path-keyed document cache over a source directory.
pub struct DocStore {
    dir: PathBuf,
    include: GlobSet,
    cache: RwLock<Option<Arc<DocMap>>>,
}

impl DocStore {
    /// Creates an unloaded store. No I/O happens until the first read.
    pub fn new(config: &DocsConfig) -> Result<Self> {
        Ok(Self {
            dir: config.dir.clone(),
            include: build_globset(&config.include_globs)?,
            cache: RwLock::new(None),
        })
    }

    /// Enumerates immediate files in the source directory and decodes the
    /// eligible ones. A nonexistent directory produces an empty map.
    pub fn scan(&self) -> DocMap {
        let mut docs = DocMap::new();
        if !self.dir.exists() {
            return docs;
        }
        for entry in WalkDir::new(&self.dir).max_depth(1).into_iter().flatten() {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !self.include.is_match(&name) {
                continue;
            }
            match load_text(entry.path()) {
                Some(body) => {
                    docs.insert(entry.path().display().to_string(), body);
                }
                None => {
                    warn!(
                        "skipping unreadable or malformed document: {}",
                        entry.path().display()
                    );
                }
            }
        }
        docs
    }

    /// Populates the cache from a scan if it has never been loaded.
    pub fn ensure_loaded(&self) {
        let _ = self.all();
    }

    /// Rescans the source directory and replaces the cache wholesale.
    /// Returns the number of documents loaded.
    pub fn reload(&self) -> usize {
        let fresh = Arc::new(self.scan());
        let count = fresh.len();
        *self.cache.write().unwrap() = Some(fresh);
        info!("document cache reloaded, {} documents", count);
        count
    }

    /// Returns the current cache snapshot, loading it first if necessary.
    /// The snapshot is shared, not copied; callers must not mutate it.
    pub fn all(&self) -> Arc<DocMap> {
        if let Some(map) = self.cache.read().unwrap().as_ref() {
            return map.clone();
        }
        // Build off to the side, publish under the write lock. If another
        // thread won the race in between, its map wins.
        let fresh = Arc::new(self.scan());
        let mut guard = self.cache.write().unwrap();
        guard.get_or_insert_with(|| fresh).clone()
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        // Extension matching is case-insensitive: NOTES.MD is eligible.
        builder.add(GlobBuilder::new(pattern).case_insensitive(true).build()?);
    }
    Ok(builder.build()?)
}

/// Decodes one file to text, or `None` if it should be skipped.
///
/// JSON files are parsed and re-serialized compactly so that formatting noise
/// never affects scoring; everything else is read with lossy UTF-8 decoding.
fn load_text(path: &Path) -> Option<String> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        let raw = std::fs::read_to_string(path).ok()?;
        let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
        serde_json::to_string(&value).ok()
    } else {
        let bytes = std::fs::read(path).ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}
