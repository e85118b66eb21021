//! Per-paper concept extraction.
//!
//! Steps per paper:
//!   1. Extract candidates with the LLM; on an empty result use heuristics
//!   2. Collapse near-duplicate candidates
//!   3. Summarise each survivor and assign its canonical concept ID
//!   4. Save all records in one batch, then upsert graph nodes and edges
//!
//! A failed LLM call aborts the paper. Graph write failures are logged and
//! do not undo the relational write.

use std::collections::HashSet;
use std::sync::Arc;

use paperatlas_common::{canonical_concept_id, ConceptCandidate, ConceptRecord, PaperRow};
use paperatlas_db::{GraphStore, PaperStore};
use tracing::{debug, info, instrument, warn};

use crate::dedup::Deduplicator;
use crate::error::{ConceptError, Result};
use crate::extraction::{ConceptExtractor, HeuristicExtractor, LlmExtractor};
use crate::summarizer::ConceptSummarizer;

pub struct ConceptExtractionPipeline {
    llm: LlmExtractor,
    heuristic: HeuristicExtractor,
    dedup: Deduplicator,
    summarizer: ConceptSummarizer,
    store: Arc<dyn PaperStore>,
    graph: Arc<dyn GraphStore>,
}

impl ConceptExtractionPipeline {
    pub fn new(
        llm: LlmExtractor,
        heuristic: HeuristicExtractor,
        dedup: Deduplicator,
        summarizer: ConceptSummarizer,
        store: Arc<dyn PaperStore>,
        graph: Arc<dyn GraphStore>,
    ) -> Self {
        Self { llm, heuristic, dedup, summarizer, store, graph }
    }

    pub fn store(&self) -> &Arc<dyn PaperStore> {
        &self.store
    }

    /// LLM candidates, or heuristic ones when the LLM yields none.
    pub async fn extract_candidates(&self, paper: &PaperRow) -> Result<Vec<ConceptCandidate>> {
        let candidates = self.llm.extract(paper).await?;
        if !candidates.is_empty() {
            return Ok(candidates);
        }
        debug!(paper_id = %paper.paper_id, "No LLM candidates, using heuristics");
        self.heuristic.extract(paper).await
    }

    #[instrument(skip(self, paper), fields(paper_id = %paper.paper_id))]
    pub async fn process_paper(&self, paper: &PaperRow) -> Result<Vec<ConceptRecord>> {
        let candidates = self.extract_candidates(paper).await?;
        let n_candidates = candidates.len();
        let survivors = self.dedup.deduplicate(candidates).await;

        let mut seen_ids = HashSet::new();
        let mut records = Vec::with_capacity(survivors.len());
        for candidate in survivors {
            let concept_id = canonical_concept_id(&candidate.name);
            if !seen_ids.insert(concept_id.clone()) {
                debug!(concept = %candidate.name, "Skipping repeated concept ID");
                continue;
            }
            let summary = self
                .summarizer
                .summarize(candidate.summary_source(), Some(&candidate.name))
                .await;
            records.push(ConceptRecord {
                concept_id,
                paper_id: paper.paper_id.clone(),
                name: candidate.name,
                summary: summary.paragraph,
                bullets: summary.bullets,
                source: candidate.source,
            });
        }

        self.persist(&records).await?;
        info!(candidates = n_candidates, concepts = records.len(), "Processed paper");
        Ok(records)
    }

    /// Fetch one paper from the store and process it.
    pub async fn process_paper_id(&self, paper_id: &str) -> Result<Vec<ConceptRecord>> {
        let paper = self
            .store
            .fetch_paper_by_id(paper_id)
            .await?
            .ok_or_else(|| ConceptError::PaperNotFound(paper_id.to_string()))?;
        self.process_paper(&paper).await
    }

    async fn persist(&self, records: &[ConceptRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.store.save_concepts(records).await?;
        if !self.graph.is_enabled() {
            return Ok(());
        }
        if let Err(e) = self.graph.upsert_concepts(records).await {
            warn!(error = %e, "Graph concept upsert failed");
            return Ok(());
        }
        if let Err(e) = self.graph.link_papers_to_concepts(records).await {
            warn!(error = %e, "Graph DISCUSSES link failed");
        }
        Ok(())
    }
}
