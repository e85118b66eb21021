//! Graph store: `Paper` and `Concept` nodes joined by `DISCUSSES` edges.
//!
//! The Neo4j implementation speaks the HTTP transactional endpoint
//! (`POST /db/<database>/tx/commit`). Every statement is a MERGE, so
//! replaying a write leaves the graph unchanged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use paperatlas_common::{sandbox::SandboxClient, ConceptRecord, PaperMetadata};
use paperatlas_config::{parse_neo4j_bolt_url, Neo4jConfig};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::error::{DbError, Result};

pub const PAPER_LABEL: &str = "Paper";
pub const CONCEPT_LABEL: &str = "Concept";
pub const DISCUSSES_REL: &str = "DISCUSSES";

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn initialize_schema(&self) -> Result<()>;
    async fn upsert_paper(&self, metadata: &PaperMetadata) -> Result<()>;
    async fn upsert_concepts(&self, records: &[ConceptRecord]) -> Result<()>;
    async fn link_papers_to_concepts(&self, records: &[ConceptRecord]) -> Result<()>;
    fn is_enabled(&self) -> bool;
}

// ── Disabled ──────────────────────────────────────────────────────────────────

/// No-op graph store used when Neo4j is not configured.
#[derive(Debug, Default)]
pub struct DisabledGraphStore;

#[async_trait]
impl GraphStore for DisabledGraphStore {
    async fn initialize_schema(&self) -> Result<()> { Ok(()) }
    async fn upsert_paper(&self, _metadata: &PaperMetadata) -> Result<()> { Ok(()) }
    async fn upsert_concepts(&self, _records: &[ConceptRecord]) -> Result<()> { Ok(()) }
    async fn link_papers_to_concepts(&self, _records: &[ConceptRecord]) -> Result<()> { Ok(()) }
    fn is_enabled(&self) -> bool { false }
}

// ── Neo4j ─────────────────────────────────────────────────────────────────────

pub struct Neo4jGraphStore {
    endpoint: String,
    user: String,
    password: String,
    client: SandboxClient,
}

impl Neo4jGraphStore {
    /// `base_url` is the HTTP root, e.g. `http://localhost:7474`.
    pub fn new(
        base_url: &str,
        database: &str,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let mut client = SandboxClient::with_timeout(Duration::from_secs(30))?;
        client.allow_url_host(base_url);
        Ok(Self {
            endpoint: format!("{}/db/{}/tx/commit", base_url.trim_end_matches('/'), database),
            user: user.into(),
            password: password.into(),
            client,
        })
    }

    /// Build from config, deriving the HTTP URL from the bolt URL's host.
    pub fn from_config(cfg: &Neo4jConfig) -> Result<Self> {
        let creds = parse_neo4j_bolt_url(&cfg.bolt_url)
            .map_err(|e| DbError::Unavailable(e.to_string()))?;
        let base_url = format!("http://{}:{}", creds.host, cfg.http_port);
        Self::new(&base_url, &cfg.database, creds.user, creds.password)
    }

    async fn run(&self, statement: &str, parameters: Value) -> Result<Value> {
        let body = json!({
            "statements": [{"statement": statement, "parameters": parameters}]
        });
        let resp = self
            .client
            .post(&self.endpoint)?
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let json: Value = resp.json().await?;
        if let Some(err) = json["errors"].as_array().and_then(|errs| errs.first()) {
            return Err(DbError::Neo4j {
                code: err["code"].as_str().unwrap_or("unknown").to_string(),
                message: err["message"].as_str().unwrap_or_default().to_string(),
            });
        }
        if !status.is_success() {
            return Err(DbError::Neo4j {
                code: status.as_u16().to_string(),
                message: json.to_string(),
            });
        }
        Ok(json)
    }

    async fn run_rows(&self, statement: &str, rows: Vec<Value>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        debug!(n = rows.len(), "Neo4j batch write");
        self.run(statement, json!({"rows": rows})).await.map(|_| ())
    }
}

fn concept_rows(records: &[ConceptRecord]) -> Vec<Value> {
    records
        .iter()
        .map(|r| {
            json!({
                "paper_id": r.paper_id,
                "concept_id": r.concept_id,
                "name": r.name,
                "summary": r.summary,
                "bullets": r.bullets,
                "source": r.source.as_str(),
            })
        })
        .collect()
}

fn paper_properties(meta: &PaperMetadata) -> Value {
    json!({
        "title": meta.title,
        "abstract": meta.abstract_text,
        "year": meta.publication_year,
        "venue": meta.venue,
        "doi": meta.doi,
        "arxiv_id": meta.arxiv_id,
        "openalex_id": meta.openalex_id,
        "crossref_id": meta.crossref_id,
        "url": meta.url,
        "pdf_url": meta.pdf_url,
        "source": meta.source,
    })
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn initialize_schema(&self) -> Result<()> {
        self.run(
            &format!(
                "CREATE CONSTRAINT paper_id_unique IF NOT EXISTS \
                 FOR (p:{PAPER_LABEL}) REQUIRE p.paper_id IS UNIQUE"
            ),
            json!({}),
        )
        .await?;
        self.run(
            &format!(
                "CREATE CONSTRAINT concept_id_unique IF NOT EXISTS \
                 FOR (c:{CONCEPT_LABEL}) REQUIRE c.concept_id IS UNIQUE"
            ),
            json!({}),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip_all, fields(title = %metadata.title))]
    async fn upsert_paper(&self, metadata: &PaperMetadata) -> Result<()> {
        self.run(
            &format!("MERGE (p:{PAPER_LABEL} {{paper_id: $paper_id}}) SET p += $properties"),
            json!({
                "paper_id": metadata.canonical_id(),
                "properties": paper_properties(metadata),
            }),
        )
        .await
        .map(|_| ())
    }

    async fn upsert_concepts(&self, records: &[ConceptRecord]) -> Result<()> {
        let statement = format!(
            "UNWIND $rows AS row \
             MERGE (c:{CONCEPT_LABEL} {{concept_id: row.concept_id}}) \
             SET c.name = row.name, c.summary = row.summary, \
                 c.bullets = row.bullets, c.source = row.source"
        );
        self.run_rows(&statement, concept_rows(records)).await
    }

    async fn link_papers_to_concepts(&self, records: &[ConceptRecord]) -> Result<()> {
        let statement = format!(
            "UNWIND $rows AS row \
             MATCH (p:{PAPER_LABEL} {{paper_id: row.paper_id}}) \
             MERGE (c:{CONCEPT_LABEL} {{concept_id: row.concept_id}}) \
             MERGE (p)-[r:{DISCUSSES_REL}]->(c) \
             SET r.source = row.source"
        );
        self.run_rows(&statement, concept_rows(records)).await
    }

    fn is_enabled(&self) -> bool { true }
}

/// Build the graph store, degrading to [`DisabledGraphStore`].
pub fn build_graph_store(cfg: &Neo4jConfig) -> Arc<dyn GraphStore> {
    if !cfg.enabled || cfg.bolt_url.trim().is_empty() {
        info!("Neo4j disabled; graph writes will be skipped");
        return Arc::new(DisabledGraphStore);
    }
    match Neo4jGraphStore::from_config(cfg) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "Neo4j client disabled");
            Arc::new(DisabledGraphStore)
        }
    }
}
