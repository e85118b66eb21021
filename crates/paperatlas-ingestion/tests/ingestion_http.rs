//! Source clients and the ingestion pipeline against mock HTTP servers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use paperatlas_common::{sandbox::SandboxClient, ConceptRecord, PaperIdentifier, PaperMetadata};
use paperatlas_db::{DisabledGraphStore, GraphStore, JsonPaperStore};
use paperatlas_ingestion::{ArxivClient, CrossRefClient, IngestionPipeline, LiteratureSource, OpenAlexClient};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn entry(id: &str, year: u32, title: &str) -> String {
    format!(
        r#"<entry>
    <id>http://arxiv.org/abs/{id}v1</id>
    <published>{year}-03-01T00:00:00Z</published>
    <title>{title}</title>
    <summary>We propose {title}.</summary>
    <author><name>A. Author</name></author>
    <category term="cs.LG"/>
  </entry>"#
    )
}

fn feed(entries: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><feed xmlns="http://www.w3.org/2005/Atom">{}</feed>"#,
        entries.join("\n")
    )
}

/// Only the mock server is reachable, so PDF links to arxiv.org are refused.
fn local_only() -> SandboxClient {
    SandboxClient::with_allowlist(Duration::from_secs(5), &["127.0.0.1"]).unwrap()
}

#[derive(Default)]
struct RecordingGraph {
    papers: Mutex<Vec<String>>,
}

#[async_trait]
impl GraphStore for RecordingGraph {
    async fn initialize_schema(&self) -> paperatlas_db::Result<()> { Ok(()) }
    async fn upsert_paper(&self, metadata: &PaperMetadata) -> paperatlas_db::Result<()> {
        self.papers.lock().unwrap().push(metadata.canonical_id());
        Ok(())
    }
    async fn upsert_concepts(&self, _records: &[ConceptRecord]) -> paperatlas_db::Result<()> { Ok(()) }
    async fn link_papers_to_concepts(&self, _records: &[ConceptRecord]) -> paperatlas_db::Result<()> { Ok(()) }
    fn is_enabled(&self) -> bool { true }
}

#[tokio::test]
async fn test_arxiv_fetch_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .and(query_param("id_list", "2101.00001"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed(&[entry("2101.00001", 2021, "AdaGraph")])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ArxivClient::new(local_only()).with_api_url(format!("{}/api/query", server.uri()));
    let meta = client.fetch_by_id("arXiv:2101.00001v3").await.unwrap().unwrap();
    assert_eq!(meta.title, "AdaGraph");
    assert_eq!(meta.arxiv_id.as_deref(), Some("2101.00001"));
}

#[tokio::test]
async fn test_arxiv_non_200_yields_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = ArxivClient::new(local_only()).with_api_url(format!("{}/api/query", server.uri()));
    assert!(client.fetch_by_id("2101.00001").await.unwrap().is_none());
    assert!(client.search("graphs", 5, None).await.unwrap().is_empty());
    assert!(client.fetch_by_id("   ").await.unwrap().is_none());
}

#[tokio::test]
async fn test_arxiv_search_filters_by_year_and_caps_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("search_query", "all:graph matching"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed(&[
            entry("2301.00001", 2023, "New One"),
            entry("1901.00002", 2019, "Too Old"),
            entry("2302.00003", 2023, "New Two"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ArxivClient::new(local_only()).with_api_url(format!("{}/api/query", server.uri()));
    let hits = client.search("graph matching", 3, Some("2022-01-01")).await.unwrap();
    let titles: Vec<_> = hits.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["New One", "New Two"]);
}

#[tokio::test]
async fn test_arxiv_search_pages_by_hundred() {
    let server = MockServer::start().await;
    let page = |start: usize, n: usize| {
        (0..n)
            .map(|i| entry(&format!("2301.{:05}", start + i), 2023, &format!("Paper {}", start + i)))
            .collect::<Vec<_>>()
    };
    Mock::given(method("GET"))
        .and(query_param("start", "0"))
        .and(query_param("max_results", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed(&page(0, 100))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("start", "100"))
        .and(query_param("max_results", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed(&page(100, 20))))
        .expect(1)
        .mount(&server)
        .await;

    let client = ArxivClient::new(local_only()).with_api_url(format!("{}/api/query", server.uri()));
    let hits = client.search("x", 120, None).await.unwrap();
    assert_eq!(hits.len(), 120);
    assert_eq!(hits[119].title, "Paper 119");
}

#[tokio::test]
async fn test_crossref_resolve_doi_and_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/works/10.1000/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": {"DOI": "10.1000/abc", "title": ["Resolved"], "abstract": "<jats:p>Text.</jats:p>"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/works/10.1000/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = CrossRefClient::new(local_only()).with_api_base(format!("{}/works", server.uri()));
    let meta = client.resolve_doi("https://doi.org/10.1000/ABC").await.unwrap().unwrap();
    assert_eq!(meta.title, "Resolved");
    assert_eq!(meta.abstract_text.as_deref(), Some("Text."));
    assert!(client.resolve_doi("10.1000/missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_pipeline_ingest_query_persists_without_pdf_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed(&[
            entry("2101.00001", 2021, "AdaGraph"),
            entry("2101.00002", 2021, "GraphSAGE"),
        ])))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let graph = Arc::new(RecordingGraph::default());
    let pipeline = IngestionPipeline::new(
        ArxivClient::new(local_only()).with_api_url(format!("{}/api/query", server.uri())),
        local_only(),
        JsonPaperStore::new(dir.path()).unwrap(),
        graph.clone(),
    );

    let records = pipeline.ingest_query("graph", 5, None).await.unwrap();
    assert_eq!(records.len(), 2);
    // arxiv.org is outside the allowlist: the download fails, the paper is kept
    assert!(records.iter().all(|r| r.raw_text.is_none()));

    let store = JsonPaperStore::new(dir.path()).unwrap();
    let saved = store.load("arxiv:2101.00001").unwrap().unwrap();
    assert_eq!(saved.metadata.title, "AdaGraph");
    assert_eq!(
        *graph.papers.lock().unwrap(),
        vec!["arxiv:2101.00001".to_string(), "arxiv:2101.00002".to_string()]
    );
}

#[tokio::test]
async fn test_pipeline_doi_falls_back_to_openalex_and_survives_bad_pdf() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crossref/works/10.1/x"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/openalex/works/https:/+doi\.org/10\.1/x$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "https://openalex.org/W1",
            "doi": "https://doi.org/10.1/x",
            "title": "From OpenAlex",
            "best_oa_location": {"pdf_url": format!("{}/paper.pdf", server.uri())}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/paper.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not a pdf".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let pipeline = IngestionPipeline::new(
        ArxivClient::new(local_only()),
        local_only(),
        JsonPaperStore::new(dir.path()).unwrap(),
        Arc::new(DisabledGraphStore),
    )
    .with_crossref(CrossRefClient::new(local_only()).with_api_base(format!("{}/crossref/works", server.uri())))
    .with_openalex(OpenAlexClient::new(local_only()).with_api_base(format!("{}/openalex/works", server.uri())));

    let records = pipeline
        .ingest_identifiers(&[PaperIdentifier::doi("10.1/x"), PaperIdentifier::default()])
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].metadata.title, "From OpenAlex");
    assert_eq!(records[0].raw_text, None);
    assert_eq!(records[0].metadata.canonical_id(), "doi:10.1/x");
}

#[tokio::test]
async fn test_pipeline_ingest_urls_skips_unknown_hosts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("id_list", "2101.00001"))
        .respond_with(ResponseTemplate::new(200).set_body_string(feed(&[entry("2101.00001", 2021, "AdaGraph")])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let pipeline = IngestionPipeline::new(
        ArxivClient::new(local_only()).with_api_url(format!("{}/api/query", server.uri())),
        local_only(),
        JsonPaperStore::new(dir.path()).unwrap(),
        Arc::new(DisabledGraphStore),
    );

    let records = pipeline
        .ingest_urls(&[
            "https://arxiv.org/abs/2101.00001v2".to_string(),
            "https://example.com/not-a-paper".to_string(),
        ])
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].metadata.canonical_id(), "arxiv:2101.00001");

    let none = pipeline.ingest_urls(&["https://example.com/x".to_string()]).await.unwrap();
    assert!(none.is_empty());
}
