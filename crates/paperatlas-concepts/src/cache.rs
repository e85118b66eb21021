//! On-disk cache of raw LLM extraction responses.
//!
//! One JSON file per `(paper, prompt)` pair, named after the cache key. The
//! key embeds a digest of the exact prompt, so any change in prompt
//! construction misses old entries instead of serving them.

use std::path::{Path, PathBuf};

use paperatlas_common::ConceptCandidate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub paper_id: String,
    pub prompt_hash: String,
    pub response_text: String,
    #[serde(default)]
    pub concepts: Vec<ConceptCandidate>,
}

/// Directory-backed key/value store for [`CacheEntry`] values.
///
/// Assumes a single writer; concurrent runs against one directory need
/// external serialisation.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    /// Open (creating if needed) a cache rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Look up `key`. An unreadable entry is reported and treated as a miss
    /// so the next call overwrites it.
    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(entry) => {
                debug!(key, "LLM cache hit");
                Ok(Some(entry))
            }
            Err(e) => {
                warn!(key, error = %e, "Ignoring corrupt LLM cache entry");
                Ok(None)
            }
        }
    }

    pub fn set(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let path = self.entry_path(key);
        std::fs::write(&path, serde_json::to_string_pretty(entry)?)?;
        debug!(key, path = %path.display(), "LLM response cached");
        Ok(())
    }
}
