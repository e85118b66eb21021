//! File-backed paper store: one JSON document per paper.
//!
//! Layout under `base_dir`:
//!   `<safe-id>.json`:          `{paper_id, metadata, raw_text, source_payload}`
//!   `concepts/<safe-id>.json`: the concept records last saved for that paper

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use paperatlas_common::{safe_filename, ConceptRecord, PaperMetadata, PaperRecord, PaperRow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DbError, Result};
use crate::store::PaperStore;

const CONCEPTS_DIR: &str = "concepts";

/// On-disk form of a paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPaper {
    pub paper_id: String,
    pub metadata: PaperMetadata,
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub source_payload: Option<serde_json::Value>,
}

impl StoredPaper {
    pub fn from_record(record: &PaperRecord) -> Self {
        Self {
            paper_id: record.metadata.canonical_id(),
            metadata: record.metadata.clone(),
            raw_text: record.raw_text.clone(),
            source_payload: record.source_payload.clone(),
        }
    }

    pub fn to_row(&self) -> PaperRow {
        PaperRow {
            paper_id: self.paper_id.clone(),
            title: self.metadata.title.clone(),
            abstract_text: self.metadata.abstract_text.clone(),
            raw_text: self.raw_text.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonPaperStore {
    base_dir: PathBuf,
}

impl JsonPaperStore {
    /// Open (creating if needed) a store rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn paper_path(&self, paper_id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", safe_filename(paper_id)))
    }

    fn concepts_path(&self, paper_id: &str) -> PathBuf {
        self.base_dir
            .join(CONCEPTS_DIR)
            .join(format!("{}.json", safe_filename(paper_id)))
    }

    /// Write a paper document, returning its path.
    pub fn save(&self, record: &PaperRecord) -> Result<PathBuf> {
        let stored = StoredPaper::from_record(record);
        let path = self.paper_path(&stored.paper_id);
        std::fs::write(&path, serde_json::to_string_pretty(&stored)?)?;
        debug!(paper_id = %stored.paper_id, path = %path.display(), "Saved paper JSON");
        Ok(path)
    }

    pub fn load(&self, paper_id: &str) -> Result<Option<StoredPaper>> {
        let path = self.paper_path(paper_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Concept records previously saved for `paper_id`.
    pub fn load_concepts(&self, paper_id: &str) -> Result<Vec<ConceptRecord>> {
        let path = self.concepts_path(paper_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }

    fn load_all(&self) -> Result<Vec<StoredPaper>> {
        let mut papers = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            let paper: StoredPaper = serde_json::from_str(&content)
                .map_err(|e| DbError::InvalidRecord(format!("{}: {e}", path.display())))?;
            papers.push(paper);
        }
        papers.sort_by(|a, b| a.paper_id.cmp(&b.paper_id));
        Ok(papers)
    }
}

#[async_trait]
impl PaperStore for JsonPaperStore {
    async fn fetch_papers(&self, limit: usize, offset: usize) -> Result<Vec<PaperRow>> {
        Ok(self
            .load_all()?
            .iter()
            .skip(offset)
            .take(limit)
            .map(StoredPaper::to_row)
            .collect())
    }

    async fn fetch_paper_by_id(&self, paper_id: &str) -> Result<Option<PaperRow>> {
        Ok(self.load(paper_id)?.map(|p| p.to_row()))
    }

    async fn save_concepts(&self, records: &[ConceptRecord]) -> Result<()> {
        let mut by_paper: BTreeMap<&str, Vec<&ConceptRecord>> = BTreeMap::new();
        for record in records {
            by_paper.entry(record.paper_id.as_str()).or_default().push(record);
        }
        if by_paper.is_empty() {
            return Ok(());
        }
        std::fs::create_dir_all(self.base_dir.join(CONCEPTS_DIR))?;
        for (paper_id, incoming) in by_paper {
            // Merge by concept_id so replays replace rather than duplicate.
            let mut merged: BTreeMap<String, ConceptRecord> = self
                .load_concepts(paper_id)?
                .into_iter()
                .map(|r| (r.concept_id.clone(), r))
                .collect();
            for record in incoming {
                merged.insert(record.concept_id.clone(), record.clone());
            }
            let rows: Vec<ConceptRecord> = merged.into_values().collect();
            std::fs::write(self.concepts_path(paper_id), serde_json::to_string_pretty(&rows)?)?;
        }
        Ok(())
    }

    async fn save_paper(&self, record: &PaperRecord) -> Result<()> {
        self.save(record).map(|_| ())
    }

    fn name(&self) -> &'static str { "json" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperatlas_common::CandidateSource;
    use pretty_assertions::assert_eq;

    fn record(title: &str, arxiv: &str) -> PaperRecord {
        let mut meta = PaperMetadata::new(title, "arxiv");
        meta.arxiv_id = Some(arxiv.to_string());
        meta.abstract_text = Some(format!("Abstract of {title}"));
        PaperRecord::new(meta, Some("body".to_string()))
    }

    fn concept(paper_id: &str, id: &str, name: &str) -> ConceptRecord {
        ConceptRecord {
            concept_id: id.to_string(),
            paper_id: paper_id.to_string(),
            name: name.to_string(),
            summary: "s".to_string(),
            bullets: vec!["a".into(), "b".into(), "c".into()],
            source: CandidateSource::Heuristic,
        }
    }

    #[test]
    fn test_save_uses_safe_filename() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonPaperStore::new(dir.path()).unwrap();
        let path = store.save(&record("T", "2101.00001")).unwrap();
        assert_eq!(path.file_name().unwrap(), "arxiv_2101.00001.json");
    }

    #[test]
    fn test_load_round_trips_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonPaperStore::new(dir.path()).unwrap();
        store.save(&record("Graph Matching", "2101.00001")).unwrap();
        let loaded = store.load("arxiv:2101.00001").unwrap().unwrap();
        assert_eq!(loaded.paper_id, "arxiv:2101.00001");
        assert_eq!(loaded.metadata.title, "Graph Matching");
        assert!(store.load("arxiv:missing").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_papers_pages_in_id_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonPaperStore::new(dir.path()).unwrap();
        for (t, id) in [("C", "2101.00003"), ("A", "2101.00001"), ("B", "2101.00002")] {
            store.save(&record(t, id)).unwrap();
        }
        let page = store.fetch_papers(2, 1).await.unwrap();
        let ids: Vec<_> = page.iter().map(|r| r.paper_id.as_str()).collect();
        assert_eq!(ids, vec!["arxiv:2101.00002", "arxiv:2101.00003"]);
        assert_eq!(page[0].abstract_text.as_deref(), Some("Abstract of B"));
    }

    #[tokio::test]
    async fn test_save_concepts_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonPaperStore::new(dir.path()).unwrap();
        let batch = vec![concept("arxiv:1", "concept:aaa", "X"), concept("arxiv:1", "concept:bbb", "Y")];
        store.save_concepts(&batch).await.unwrap();
        store.save_concepts(&batch).await.unwrap();
        assert_eq!(store.load_concepts("arxiv:1").unwrap().len(), 2);
        // concepts/ subdirectory is not mistaken for a paper
        assert!(store.fetch_papers(10, 0).await.unwrap().is_empty());
    }
}
