//! MySQL paper and concept store.
//!
//! Handles:
//! - `papers` / `concepts` table creation
//! - Paper upsert keyed on canonical `paper_id`
//! - Concept upsert keyed on `(paper_id, concept_id)`
//! - Paged reads for the extraction batch driver

use async_trait::async_trait;
use paperatlas_common::{ConceptRecord, PaperMetadata, PaperRecord, PaperRow};
use paperatlas_config::MySqlConfig;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::types::Json;
use sqlx::Row;
use tracing::{info, instrument};

use crate::error::{DbError, Result};
use crate::store::PaperStore;

const CREATE_PAPERS: &str = r#"
    CREATE TABLE IF NOT EXISTS papers (
        paper_id VARCHAR(255) PRIMARY KEY,
        metadata JSON,
        raw_text LONGTEXT,
        source_payload JSON
    )
"#;

const CREATE_CONCEPTS: &str = r#"
    CREATE TABLE IF NOT EXISTS concepts (
        paper_id VARCHAR(255) NOT NULL,
        concept_id VARCHAR(64) NOT NULL,
        name VARCHAR(512) NOT NULL,
        summary TEXT,
        bullets JSON,
        source VARCHAR(32),
        PRIMARY KEY (paper_id, concept_id)
    )
"#;

/// MySQL-backed [`PaperStore`].
#[derive(Clone)]
pub struct MySqlPaperStore {
    pool: MySqlPool,
}

impl MySqlPaperStore {
    pub fn new(pool: MySqlPool) -> Self { Self { pool } }

    /// Connect using `cfg` and make sure both tables exist.
    #[instrument(skip(cfg), fields(host = %cfg.host, database = %cfg.database))]
    pub async fn connect(cfg: &MySqlConfig) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&cfg.host)
            .port(cfg.port)
            .username(&cfg.user)
            .password(&cfg.password)
            .database(&cfg.database);
        let pool = MySqlPoolOptions::new()
            .max_connections(cfg.max_connections.max(1))
            .connect_with(options)
            .await?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        info!("MySQL store ready");
        Ok(store)
    }

    pub fn pool(&self) -> &MySqlPool { &self.pool }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_PAPERS).execute(&self.pool).await?;
        sqlx::query(CREATE_CONCEPTS).execute(&self.pool).await?;
        Ok(())
    }

    fn row_to_paper(row: &sqlx::mysql::MySqlRow) -> Result<PaperRow> {
        let paper_id: String = row.try_get("paper_id")?;
        let metadata: Option<Json<serde_json::Value>> = row.try_get("metadata")?;
        let raw_text: Option<String> = row.try_get("raw_text")?;
        let metadata = metadata.map(|Json(v)| v).unwrap_or_default();
        Ok(paper_row_from_parts(paper_id, &metadata, raw_text))
    }
}

/// Pull `title` and `abstract` out of a stored metadata document.
pub(crate) fn paper_row_from_parts(
    paper_id: String,
    metadata: &serde_json::Value,
    raw_text: Option<String>,
) -> PaperRow {
    PaperRow {
        paper_id,
        title: metadata["title"].as_str().unwrap_or_default().to_string(),
        abstract_text: metadata["abstract"].as_str().map(str::to_string),
        raw_text,
    }
}

fn metadata_json(meta: &PaperMetadata) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(meta)?)
}

#[async_trait]
impl PaperStore for MySqlPaperStore {
    async fn fetch_papers(&self, limit: usize, offset: usize) -> Result<Vec<PaperRow>> {
        let rows = sqlx::query(
            "SELECT paper_id, metadata, raw_text FROM papers ORDER BY paper_id LIMIT ? OFFSET ?",
        )
        .bind(limit as u64)
        .bind(offset as u64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_paper).collect()
    }

    async fn fetch_paper_by_id(&self, paper_id: &str) -> Result<Option<PaperRow>> {
        let row = sqlx::query("SELECT paper_id, metadata, raw_text FROM papers WHERE paper_id = ?")
            .bind(paper_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_paper).transpose()
    }

    #[instrument(skip(self, records), fields(n = records.len()))]
    async fn save_concepts(&self, records: &[ConceptRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO concepts (paper_id, concept_id, name, summary, bullets, source)
                VALUES (?, ?, ?, ?, ?, ?)
                ON DUPLICATE KEY UPDATE
                    name = VALUES(name),
                    summary = VALUES(summary),
                    bullets = VALUES(bullets),
                    source = VALUES(source)
                "#,
            )
            .bind(&record.paper_id)
            .bind(&record.concept_id)
            .bind(&record.name)
            .bind(&record.summary)
            .bind(Json(&record.bullets))
            .bind(record.source.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn save_paper(&self, record: &PaperRecord) -> Result<()> {
        let paper_id = record.metadata.canonical_id();
        let metadata = metadata_json(&record.metadata)?;
        sqlx::query(
            r#"
            INSERT INTO papers (paper_id, metadata, raw_text, source_payload)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                metadata = VALUES(metadata),
                raw_text = VALUES(raw_text),
                source_payload = VALUES(source_payload)
            "#,
        )
        .bind(&paper_id)
        .bind(Json(metadata))
        .bind(&record.raw_text)
        .bind(record.source_payload.as_ref().map(Json))
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    fn name(&self) -> &'static str { "mysql" }
}
