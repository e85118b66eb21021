//! Paper metadata source clients.

pub mod arxiv;
pub mod crossref;
pub mod openalex;

use async_trait::async_trait;
use paperatlas_common::PaperMetadata;

/// Common interface for sources that support free-text search.
#[async_trait]
pub trait LiteratureSource: Send + Sync {
    /// Search for papers matching a query, returns metadata list.
    ///
    /// `from_date` is `YYYY-MM-DD`; only its year is used for filtering.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        from_date: Option<&str>,
    ) -> anyhow::Result<Vec<PaperMetadata>>;

    fn name(&self) -> &'static str;
}

/// Year component of a `YYYY-MM-DD` (or `YYYY`) date string.
pub(crate) fn year_of(date: &str) -> Option<i32> {
    date.split('-').next()?.trim().parse().ok()
}
