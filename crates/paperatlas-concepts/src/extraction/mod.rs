//! Concept candidate extraction strategies.
//!
//! Both strategies share one output contract: a list of
//! [`ConceptCandidate`]s with provenance. The pipeline tries the LLM
//! strategy first and falls back to the heuristic one on an empty result.

pub mod heuristic;
pub mod llm;

use async_trait::async_trait;
use paperatlas_common::{ConceptCandidate, PaperRow};

use crate::error::Result;

pub use heuristic::HeuristicExtractor;
pub use llm::{LlmExtractor, EXTRACTION_SYSTEM_PROMPT};

#[async_trait]
pub trait ConceptExtractor: Send + Sync {
    /// Propose concept candidates for one paper.
    async fn extract(&self, paper: &PaperRow) -> Result<Vec<ConceptCandidate>>;

    fn name(&self) -> &'static str;
}
