//! paperatlas-concepts: concept extraction, deduplication and summarisation.
//!
//! Per paper: LLM extraction (cached on disk) with a heuristic fallback,
//! embedding-based near-duplicate suppression, a paragraph-plus-bullets
//! summary for every surviving concept, and persistence to the paper store
//! and the graph. [`batch`] drives whole runs with resumable checkpoints.

pub mod batch;
pub mod cache;
pub mod dedup;
pub mod error;
pub mod extraction;
pub mod pipeline;
pub mod summarizer;

pub use batch::{run_batch, run_single, BatchOptions, BatchSummary, Checkpoint, RunLog};
pub use cache::{CacheEntry, ResponseCache};
pub use dedup::{dedup_exact, Deduplicator, DEFAULT_DEDUP_THRESHOLD};
pub use error::{ConceptError, Result};
pub use extraction::{ConceptExtractor, HeuristicExtractor, LlmExtractor};
pub use pipeline::ConceptExtractionPipeline;
pub use summarizer::{ConceptSummarizer, HeuristicSummarizer, LlmSummarizer, SummaryStrategy};
