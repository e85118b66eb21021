//! In-memory fakes shared by the concept integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use paperatlas_common::{ConceptRecord, PaperMetadata, PaperRecord, PaperRow};
use paperatlas_concepts::extraction::EXTRACTION_SYSTEM_PROMPT;
use paperatlas_concepts::{
    ConceptExtractionPipeline, ConceptSummarizer, Deduplicator, HeuristicExtractor, LlmExtractor, ResponseCache,
    DEFAULT_DEDUP_THRESHOLD,
};
use paperatlas_db::{DbError, GraphStore, PaperStore};
use paperatlas_llm::{EmbedError, Embedder, LlmBackend, LlmError};

pub const SUMMARY_REPLY: &str = "What makes this idea tick?\n\
     It reframes the problem so that a simple model does the heavy lifting.\n\
     Why this matters:\n\
     - It removes a costly preprocessing stage.\n\
     - It transfers across datasets without retuning.\n\
     - It is easy to reproduce from the released code.\n\
     Read the paper to see the full ablations.";

// ── LLM ──────────────────────────────────────────────────────────────────────

/// Replies by system prompt: extraction prompts get `extraction_reply`,
/// anything else gets `summary_reply` (or an error when that is `None`).
pub struct ScriptedLlm {
    pub extraction_reply: String,
    pub summary_reply: Option<String>,
    /// User prompts containing this text fail.
    pub fail_on: Option<String>,
    extraction_calls: AtomicUsize,
    summary_calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(extraction_reply: &str) -> Self {
        Self {
            extraction_reply: extraction_reply.to_string(),
            summary_reply: Some(SUMMARY_REPLY.to_string()),
            fail_on: None,
            extraction_calls: AtomicUsize::new(0),
            summary_calls: AtomicUsize::new(0),
        }
    }

    pub fn without_summaries(mut self) -> Self {
        self.summary_reply = None;
        self
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    pub fn extraction_calls(&self) -> usize {
        self.extraction_calls.load(Ordering::SeqCst)
    }

    pub fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmBackend for ScriptedLlm {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        if let Some(needle) = &self.fail_on {
            if user_prompt.contains(needle.as_str()) {
                return Err(LlmError::ApiError { status: 500, message: "scripted failure".to_string() });
            }
        }
        if system_prompt == EXTRACTION_SYSTEM_PROMPT {
            self.extraction_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(self.extraction_reply.clone());
        }
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        self.summary_reply
            .clone()
            .ok_or_else(|| LlmError::Unavailable("summaries disabled".to_string()))
    }

    fn model_id(&self) -> &str { "scripted" }
    fn is_local(&self) -> bool { true }
}

// ── Embedder ─────────────────────────────────────────────────────────────────

/// Fixed vectors per name; unknown names get a vector of their own.
pub struct TableEmbedder {
    table: HashMap<String, Vec<f32>>,
}

impl TableEmbedder {
    pub fn new(entries: &[(&str, Vec<f32>)]) -> Self {
        Self { table: entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect() }
    }
}

#[async_trait]
impl Embedder for TableEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                self.table.get(t).cloned().unwrap_or_else(|| {
                    let mut v = vec![0.0; 64];
                    v[i % 64] = 1.0;
                    v
                })
            })
            .collect())
    }

    fn model_name(&self) -> &str { "table" }
}

// ── Stores ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    papers: Vec<PaperRow>,
    saved: Mutex<Vec<ConceptRecord>>,
    fetches: Mutex<Vec<(usize, usize)>>,
}

impl MemoryStore {
    pub fn new(papers: Vec<PaperRow>) -> Self {
        Self { papers, ..Default::default() }
    }

    pub fn saved(&self) -> Vec<ConceptRecord> {
        self.saved.lock().unwrap().clone()
    }

    /// `(limit, offset)` of every page request.
    pub fn fetches(&self) -> Vec<(usize, usize)> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaperStore for MemoryStore {
    async fn fetch_papers(&self, limit: usize, offset: usize) -> paperatlas_db::Result<Vec<PaperRow>> {
        self.fetches.lock().unwrap().push((limit, offset));
        Ok(self.papers.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn fetch_paper_by_id(&self, paper_id: &str) -> paperatlas_db::Result<Option<PaperRow>> {
        Ok(self.papers.iter().find(|p| p.paper_id == paper_id).cloned())
    }

    async fn save_concepts(&self, records: &[ConceptRecord]) -> paperatlas_db::Result<()> {
        self.saved.lock().unwrap().extend_from_slice(records);
        Ok(())
    }

    async fn save_paper(&self, _record: &PaperRecord) -> paperatlas_db::Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str { "memory" }
}

#[derive(Default)]
pub struct RecordingGraph {
    pub fail: bool,
    concepts: Mutex<Vec<String>>,
    link_calls: AtomicUsize,
}

impl RecordingGraph {
    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    pub fn concept_ids(&self) -> Vec<String> {
        self.concepts.lock().unwrap().clone()
    }

    pub fn link_calls(&self) -> usize {
        self.link_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphStore for RecordingGraph {
    async fn initialize_schema(&self) -> paperatlas_db::Result<()> {
        Ok(())
    }

    async fn upsert_paper(&self, _metadata: &PaperMetadata) -> paperatlas_db::Result<()> {
        Ok(())
    }

    async fn upsert_concepts(&self, records: &[ConceptRecord]) -> paperatlas_db::Result<()> {
        if self.fail {
            return Err(DbError::Unavailable("graph down".to_string()));
        }
        self.concepts.lock().unwrap().extend(records.iter().map(|r| r.concept_id.clone()));
        Ok(())
    }

    async fn link_papers_to_concepts(&self, _records: &[ConceptRecord]) -> paperatlas_db::Result<()> {
        self.link_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_enabled(&self) -> bool { true }
}

// ── Builders ─────────────────────────────────────────────────────────────────

pub fn paper(id: &str, title: &str, raw_text: &str) -> PaperRow {
    PaperRow {
        paper_id: id.to_string(),
        title: title.to_string(),
        abstract_text: None,
        raw_text: Some(raw_text.to_string()),
    }
}

/// `paper-00` .. `paper-{n-1}`, titled `Paper N`.
pub fn numbered_papers(n: usize) -> Vec<PaperRow> {
    (0..n)
        .map(|i| {
            paper(
                &format!("paper-{i:02}"),
                &format!("Paper {i}"),
                &format!("We propose Method{i} for sparse graphs. It scales to millions of nodes."),
            )
        })
        .collect()
}

pub fn pipeline(
    backend: Option<Arc<ScriptedLlm>>,
    embedder: Arc<dyn Embedder>,
    cache_dir: &Path,
    store: Arc<MemoryStore>,
    graph: Arc<dyn GraphStore>,
) -> ConceptExtractionPipeline {
    let backend = backend.map(|b| b as Arc<dyn LlmBackend>);
    let cache = ResponseCache::new(cache_dir).unwrap();
    ConceptExtractionPipeline::new(
        LlmExtractor::new(backend.clone(), cache),
        HeuristicExtractor::default(),
        Deduplicator::new(embedder, DEFAULT_DEDUP_THRESHOLD).unwrap(),
        ConceptSummarizer::new(backend),
        store,
        graph,
    )
}
