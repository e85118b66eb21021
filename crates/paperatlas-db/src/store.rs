//! Paper store abstraction consumed by ingestion and concept extraction.

use async_trait::async_trait;
use paperatlas_common::{ConceptRecord, PaperRecord, PaperRow};

use crate::error::Result;

/// Relational-style store for papers and their extracted concepts.
///
/// Writes have upsert semantics: replaying the same record is a no-op
/// beyond refreshing its fields.
#[async_trait]
pub trait PaperStore: Send + Sync {
    /// Page through papers ordered by `paper_id`.
    async fn fetch_papers(&self, limit: usize, offset: usize) -> Result<Vec<PaperRow>>;

    async fn fetch_paper_by_id(&self, paper_id: &str) -> Result<Option<PaperRow>>;

    /// Persist all concept records for one or more papers in one batch.
    async fn save_concepts(&self, records: &[ConceptRecord]) -> Result<()>;

    async fn save_paper(&self, record: &PaperRecord) -> Result<()>;

    fn name(&self) -> &'static str;
}
