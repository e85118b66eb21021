//! Paper ingestion pipeline.
//!
//! Steps per paper:
//!   1. Resolve metadata (arXiv by ID, Crossref/OpenAlex by DOI, or a search)
//!   2. Download the PDF when a link is known
//!   3. Extract text with lopdf
//!   4. Persist to the JSON store, the relational store and the graph
//!
//! Download and parse failures are logged and the paper is kept without text.

use std::sync::Arc;

use anyhow::{Context, Result};
use paperatlas_common::{
    normalize_arxiv_id, normalize_doi, sandbox::SandboxClient as Client, PaperIdentifier,
    PaperMetadata, PaperRecord,
};
use paperatlas_db::{GraphStore, JsonPaperStore, PaperStore};
use tracing::{info, instrument, warn};

use crate::pdf_parser::parse_pdf_bytes;
use crate::sources::arxiv::ArxivClient;
use crate::sources::crossref::CrossRefClient;
use crate::sources::openalex::OpenAlexClient;
use crate::sources::LiteratureSource;

pub struct IngestionPipeline {
    arxiv: ArxivClient,
    crossref: Option<CrossRefClient>,
    openalex: Option<OpenAlexClient>,
    http: Client,
    json_store: JsonPaperStore,
    paper_store: Option<Arc<dyn PaperStore>>,
    graph: Arc<dyn GraphStore>,
}

impl IngestionPipeline {
    pub fn new(arxiv: ArxivClient, http: Client, json_store: JsonPaperStore, graph: Arc<dyn GraphStore>) -> Self {
        Self {
            arxiv,
            crossref: None,
            openalex: None,
            http,
            json_store,
            paper_store: None,
            graph,
        }
    }

    pub fn with_paper_store(mut self, store: Arc<dyn PaperStore>) -> Self {
        self.paper_store = Some(store);
        self
    }

    pub fn with_crossref(mut self, client: CrossRefClient) -> Self {
        self.crossref = Some(client);
        self
    }

    pub fn with_openalex(mut self, client: OpenAlexClient) -> Self {
        self.openalex = Some(client);
        self
    }

    /// Ingest explicit identifiers. Unresolvable identifiers are skipped with
    /// a warning; storage failures abort.
    #[instrument(skip_all, fields(n = identifiers.len()))]
    pub async fn ingest_identifiers(&self, identifiers: &[PaperIdentifier]) -> Result<Vec<PaperRecord>> {
        let mut records = Vec::new();
        for identifier in identifiers {
            let metadata = match self.fetch_metadata(identifier).await {
                Ok(Some(m)) => m,
                Ok(None) => {
                    warn!(?identifier, "No metadata found");
                    continue;
                }
                Err(e) => {
                    warn!(?identifier, error = %e, "Metadata lookup failed");
                    continue;
                }
            };
            let record = self.enrich_record(metadata).await;
            self.persist(&record).await?;
            records.push(record);
        }
        info!(n = records.len(), "Ingested records from identifiers");
        Ok(records)
    }

    /// Ingest arXiv or doi.org URLs. Other URLs are skipped with a warning.
    pub async fn ingest_urls(&self, urls: &[String]) -> Result<Vec<PaperRecord>> {
        let identifiers: Vec<PaperIdentifier> = urls
            .iter()
            .filter_map(|url| {
                let id = identifier_from_url(url);
                if id.is_none() {
                    warn!(url = %url, "Unrecognised paper URL");
                }
                id
            })
            .collect();
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }
        self.ingest_identifiers(&identifiers).await
    }

    /// Search arXiv and ingest every hit.
    #[instrument(skip(self))]
    pub async fn ingest_query(&self, query: &str, max_results: usize, from_date: Option<&str>) -> Result<Vec<PaperRecord>> {
        let hits = self
            .arxiv
            .search(query, max_results, from_date)
            .await
            .context("arXiv search failed")?;
        let mut records = Vec::with_capacity(hits.len());
        for metadata in hits {
            let record = self.enrich_record(metadata).await;
            self.persist(&record).await?;
            records.push(record);
        }
        info!(n = records.len(), "Ingested records from query");
        Ok(records)
    }

    async fn fetch_metadata(&self, identifier: &PaperIdentifier) -> Result<Option<PaperMetadata>> {
        if let Some(arxiv_id) = identifier.arxiv_id.as_deref() {
            return self.arxiv.fetch_by_id(arxiv_id).await;
        }
        if let Some(doi) = identifier.doi.as_deref() {
            if self.crossref.is_none() && self.openalex.is_none() {
                warn!(doi, "DOI ingestion needs Crossref or OpenAlex enabled");
                return Ok(None);
            }
            if let Some(crossref) = &self.crossref {
                if let Some(meta) = crossref.resolve_doi(doi).await? {
                    return Ok(Some(meta));
                }
            }
            if let Some(openalex) = &self.openalex {
                return openalex.fetch_by_doi(doi).await;
            }
            return Ok(None);
        }
        if let Some(openalex_id) = identifier.openalex_id.as_deref() {
            match &self.openalex {
                Some(openalex) => return openalex.fetch_by_id(openalex_id).await,
                None => warn!(openalex_id, "OpenAlex ingestion is disabled"),
            }
        }
        Ok(None)
    }

    async fn enrich_record(&self, metadata: PaperMetadata) -> PaperRecord {
        let raw_text = match metadata.pdf_url.as_deref() {
            Some(url) => self.download_and_parse_pdf(url).await,
            None => None,
        };
        PaperRecord::new(metadata, raw_text)
    }

    async fn download_and_parse_pdf(&self, pdf_url: &str) -> Option<String> {
        let bytes = match self.download(pdf_url).await {
            Ok(b) => b,
            Err(e) => {
                warn!(pdf_url, error = %e, "Failed to download PDF");
                return None;
            }
        };
        match parse_pdf_bytes(&bytes) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(pdf_url, error = %e, "Failed to parse PDF");
                None
            }
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.http.get(url)?.send().await?.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn persist(&self, record: &PaperRecord) -> Result<()> {
        let paper_id = record.metadata.canonical_id();
        self.json_store.save(record).with_context(|| format!("saving {paper_id} to JSON store"))?;
        if let Some(store) = &self.paper_store {
            store
                .save_paper(record)
                .await
                .with_context(|| format!("saving {paper_id} to {} store", store.name()))?;
        }
        if let Err(e) = self.graph.upsert_paper(&record.metadata).await {
            warn!(paper_id = %paper_id, error = %e, "Graph upsert failed");
        }
        Ok(())
    }
}

/// Classify a paper URL as an arXiv or DOI identifier.
pub fn identifier_from_url(url: &str) -> Option<PaperIdentifier> {
    let lower = url.trim().to_lowercase();
    if lower.contains("arxiv.org/abs/") || lower.contains("arxiv.org/pdf/") {
        let tail = lower.rsplit_once("/abs/").or_else(|| lower.rsplit_once("/pdf/"))?.1;
        let tail = tail.trim_end_matches(".pdf");
        return normalize_arxiv_id(tail).map(PaperIdentifier::arxiv);
    }
    if let Some((_, doi)) = lower.split_once("doi.org/") {
        return normalize_doi(doi).map(PaperIdentifier::doi);
    }
    None
}
