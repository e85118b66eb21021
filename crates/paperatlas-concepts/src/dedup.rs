//! Near-duplicate suppression for concept candidates.
//!
//! Candidate names are embedded and compared pairwise. Walking the list in
//! order, each surviving candidate suppresses every later candidate whose
//! cosine similarity to it reaches the threshold. Suppression is relative to
//! that representative only: if A~B and B~C but not A~C, A and C both
//! survive. Input order therefore decides which name represents a cluster.
//!
//! When the embedder is unavailable or fails, names are compared exactly
//! after trimming and lower-casing.

use std::collections::HashSet;
use std::sync::Arc;

use paperatlas_common::ConceptCandidate;
use paperatlas_llm::{cosine_similarity, Embedder};
use tracing::{debug, instrument, warn};

use crate::error::{ConceptError, Result};

pub const DEFAULT_DEDUP_THRESHOLD: f32 = 0.85;

pub struct Deduplicator {
    embedder: Arc<dyn Embedder>,
    threshold: f32,
}

impl Deduplicator {
    /// Fails unless `threshold` is finite and in `(0, 1]`.
    pub fn new(embedder: Arc<dyn Embedder>, threshold: f32) -> Result<Self> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConceptError::InvalidThreshold(threshold));
        }
        Ok(Self { embedder, threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Order-preserving subset of `candidates` with near-duplicates removed.
    #[instrument(skip_all, fields(n = candidates.len(), threshold = self.threshold))]
    pub async fn deduplicate(&self, candidates: Vec<ConceptCandidate>) -> Vec<ConceptCandidate> {
        if candidates.len() <= 1 {
            return candidates;
        }
        let names: Vec<String> = candidates.iter().map(|c| c.name.clone()).collect();
        let vectors = match self.embedder.embed(&names).await {
            Ok(v) if v.len() == names.len() => v,
            Ok(v) => {
                warn!(expected = names.len(), got = v.len(), "Embedding count mismatch, using string fallback");
                return dedup_exact(candidates);
            }
            Err(e) => {
                warn!(error = %e, "Embedding model unavailable, using string fallback");
                return dedup_exact(candidates);
            }
        };

        let keep = greedy_representatives(&vectors, self.threshold);
        debug!(kept = keep.len(), "Semantic dedup done");
        let keep: HashSet<usize> = keep.into_iter().collect();
        candidates
            .into_iter()
            .enumerate()
            .filter_map(|(i, c)| keep.contains(&i).then_some(c))
            .collect()
    }
}

/// Indices of first-seen representatives under single-pass suppression.
pub fn greedy_representatives(vectors: &[Vec<f32>], threshold: f32) -> Vec<usize> {
    let n = vectors.len();
    let mut suppressed = vec![false; n];
    let mut keep = Vec::new();
    for i in 0..n {
        if suppressed[i] {
            continue;
        }
        keep.push(i);
        for j in (i + 1)..n {
            if cosine_similarity(&vectors[i], &vectors[j]) >= threshold {
                suppressed[j] = true;
            }
        }
    }
    keep
}

/// Exact-name dedup, case- and surrounding-whitespace-insensitive.
pub fn dedup_exact(candidates: Vec<ConceptCandidate>) -> Vec<ConceptCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.name.trim().to_lowercase()))
        .collect()
}
