//! Core data models shared by ingestion, extraction and storage.

use serde::{Deserialize, Serialize};

use crate::ids::canonical_paper_id;

// ── Papers ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperAuthor {
    pub name: String,
    #[serde(default)]
    pub affiliation: Option<String>,
    #[serde(default)]
    pub orcid: Option<String>,
}

/// Bibliographic metadata for a discovered paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub authors: Vec<PaperAuthor>,
    #[serde(default)]
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub arxiv_id: Option<String>,
    #[serde(default)]
    pub openalex_id: Option<String>,
    #[serde(default)]
    pub crossref_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    pub source: String,
}

impl PaperMetadata {
    /// Minimal metadata with only a title and source set.
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            abstract_text: None,
            authors: Vec::new(),
            publication_year: None,
            venue: None,
            doi: None,
            arxiv_id: None,
            openalex_id: None,
            crossref_id: None,
            url: None,
            pdf_url: None,
            source: source.into(),
        }
    }

    pub fn canonical_id(&self) -> String {
        let fallback = self
            .openalex_id
            .as_deref()
            .or(self.crossref_id.as_deref())
            .unwrap_or(&self.title);
        canonical_paper_id(self.doi.as_deref(), self.arxiv_id.as_deref(), fallback)
    }
}

/// Metadata plus the extracted full text, as persisted by ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRecord {
    pub metadata: PaperMetadata,
    pub raw_text: Option<String>,
    pub source_payload: Option<serde_json::Value>,
}

impl PaperRecord {
    pub fn new(metadata: PaperMetadata, raw_text: Option<String>) -> Self {
        Self { metadata, raw_text, source_payload: None }
    }
}

/// A paper as handed to concept extraction by the paper store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRow {
    pub paper_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub raw_text: Option<String>,
}

impl From<&PaperRecord> for PaperRow {
    fn from(record: &PaperRecord) -> Self {
        Self {
            paper_id: record.metadata.canonical_id(),
            title: record.metadata.title.clone(),
            abstract_text: record.metadata.abstract_text.clone(),
            raw_text: record.raw_text.clone(),
        }
    }
}

/// User-supplied identifier for ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperIdentifier {
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub openalex_id: Option<String>,
}

impl PaperIdentifier {
    pub fn doi(doi: impl Into<String>) -> Self {
        Self { doi: Some(doi.into()), ..Default::default() }
    }

    pub fn arxiv(arxiv_id: impl Into<String>) -> Self {
        Self { arxiv_id: Some(arxiv_id.into()), ..Default::default() }
    }
}

// ── Concepts ─────────────────────────────────────────────────────────────────

/// Which extractor produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Heuristic,
    Llm,
}

impl CandidateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateSource::Heuristic => "heuristic",
            CandidateSource::Llm       => "llm",
        }
    }
}

impl std::fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unvalidated concept proposal. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptCandidate {
    pub name: String,
    pub source: CandidateSource,
    /// Match context for heuristic candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    /// Narrative text for LLM candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<String>,
}

impl ConceptCandidate {
    pub fn heuristic(name: impl Into<String>, evidence: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: CandidateSource::Heuristic,
            evidence: Some(evidence.into()),
            post: None,
        }
    }

    pub fn llm(name: impl Into<String>, post: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: CandidateSource::Llm,
            evidence: None,
            post: Some(post.into()),
        }
    }

    /// Text the summariser works from: the LLM post, else the heuristic
    /// evidence, else the bare name.
    pub fn summary_source(&self) -> &str {
        self.post
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .or(self.evidence.as_deref())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptSummary {
    pub paragraph: String,
    pub bullets: Vec<String>,
}

/// One concept discussed by one paper, ready for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptRecord {
    pub concept_id: String,
    pub paper_id: String,
    pub name: String,
    pub summary: String,
    pub bullets: Vec<String>,
    pub source: CandidateSource,
}
