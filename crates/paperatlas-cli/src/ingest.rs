//! `paperatlas ingest`

use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{Duration, NaiveDate, Utc};
use clap::Args;
use paperatlas_common::{sandbox::SandboxClient, PaperIdentifier};
use paperatlas_config::Config;
use paperatlas_db::{build_graph_store, JsonPaperStore, MySqlPaperStore};
use paperatlas_ingestion::{ArxivClient, CrossRefClient, IngestionPipeline, OpenAlexClient};
use tracing::{info, warn};

use crate::MySqlOverrides;

const NO_INPUT: &str = "Provide --url, --doi, --arxiv, or --query.";

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// DOI to ingest (repeatable)
    #[arg(long)]
    pub doi: Vec<String>,

    /// arXiv ID to ingest (repeatable)
    #[arg(long)]
    pub arxiv: Vec<String>,

    /// arXiv or doi.org URL to ingest (repeatable)
    #[arg(long)]
    pub url: Vec<String>,

    /// arXiv search query
    #[arg(long)]
    pub query: Option<String>,

    #[arg(long, default_value_t = 5)]
    pub max_results: usize,

    /// Keep search results published from this date (YYYY-MM-DD)
    #[arg(long)]
    pub from_date: Option<String>,

    /// Keep search results from the last N days; wins over --from-date
    #[arg(long)]
    pub last_days: Option<u32>,

    #[command(flatten)]
    pub mysql: MySqlOverrides,

    /// Write papers to the JSON store only
    #[arg(long)]
    pub no_mysql: bool,

    #[arg(long)]
    pub neo4j_bolt_url: Option<String>,

    #[arg(long)]
    pub no_neo4j: bool,
}

impl IngestArgs {
    fn has_inputs(&self) -> bool {
        self.query.is_some() || !self.doi.is_empty() || !self.arxiv.is_empty() || !self.url.is_empty()
    }

    fn apply(&self, cfg: &mut Config) {
        self.mysql.apply(&mut cfg.mysql);
        if self.no_mysql {
            cfg.mysql.enabled = false;
        }
        if let Some(url) = &self.neo4j_bolt_url {
            cfg.neo4j.bolt_url = url.clone();
        }
        if self.no_neo4j {
            cfg.neo4j.enabled = false;
        }
    }

    fn identifiers(&self) -> Vec<PaperIdentifier> {
        self.doi
            .iter()
            .map(PaperIdentifier::doi)
            .chain(self.arxiv.iter().map(PaperIdentifier::arxiv))
            .collect()
    }
}

/// `--last-days` counted back from `today`, else `--from-date` as given.
fn resolve_from_date(from_date: Option<&str>, last_days: Option<u32>, today: NaiveDate) -> Option<String> {
    match last_days {
        Some(days) => Some((today - Duration::days(i64::from(days))).format("%Y-%m-%d").to_string()),
        None => from_date.map(str::to_string),
    }
}

pub async fn run(args: IngestArgs, mut cfg: Config) -> anyhow::Result<()> {
    if !args.has_inputs() {
        bail!(NO_INPUT);
    }
    args.apply(&mut cfg);

    let http = SandboxClient::new()?;
    let graph = build_graph_store(&cfg.neo4j);
    if graph.is_enabled() {
        if let Err(e) = graph.initialize_schema().await {
            warn!(error = %e, "Neo4j schema setup failed");
        }
    }
    let json_store = JsonPaperStore::new(&cfg.paths.papers_dir)?;

    let mut pipeline = IngestionPipeline::new(ArxivClient::new(http.clone()), http.clone(), json_store, graph)
        .with_crossref(CrossRefClient::new(http.clone()))
        .with_openalex(OpenAlexClient::new(http));
    if cfg.mysql.enabled {
        let store = MySqlPaperStore::connect(&cfg.mysql).await.context("connecting to MySQL")?;
        pipeline = pipeline.with_paper_store(Arc::new(store));
    }

    if let Some(query) = &args.query {
        let from_date = resolve_from_date(args.from_date.as_deref(), args.last_days, Utc::now().date_naive());
        let records = pipeline.ingest_query(query, args.max_results, from_date.as_deref()).await?;
        info!("Ingested {} records from query", records.len());
        return Ok(());
    }

    let mut records = pipeline.ingest_urls(&args.url).await?;
    let identifiers = args.identifiers();
    if !identifiers.is_empty() {
        records.extend(pipeline.ingest_identifiers(&identifiers).await?);
    }
    if records.is_empty() {
        bail!("No papers could be resolved from the given inputs.");
    }
    info!("Ingested {} records from inputs", records.len());
    Ok(())
}
