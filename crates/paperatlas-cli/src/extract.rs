//! `paperatlas extract`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use paperatlas_concepts::{
    batch::DEFAULT_LIMIT, run_batch, run_single, BatchOptions, ConceptExtractionPipeline, ConceptSummarizer,
    Deduplicator, HeuristicExtractor, LlmExtractor, ResponseCache,
};
use paperatlas_config::Config;
use paperatlas_db::{build_graph_store, JsonPaperStore, MySqlPaperStore, PaperStore};
use paperatlas_llm::{build_embedder, build_llm_backend};
use tracing::{info, warn};

use crate::MySqlOverrides;

#[derive(Args, Debug)]
pub struct ExtractArgs {
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub min_concepts: Option<usize>,

    #[arg(long)]
    pub max_concepts: Option<usize>,

    #[arg(long)]
    pub dedup_threshold: Option<f32>,

    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Process a single stored paper
    #[arg(long)]
    pub paper_id: Option<String>,

    /// Resume from the last checkpoint
    #[arg(long)]
    pub resume: bool,

    /// Serve cached LLM replies only; never call the model
    #[arg(long)]
    pub offline: bool,

    /// Heuristic extraction and summaries only
    #[arg(long)]
    pub no_llm: bool,

    #[arg(long)]
    pub no_neo4j: bool,

    /// Read papers from the JSON store instead of MySQL
    #[arg(long)]
    pub no_mysql: bool,

    #[command(flatten)]
    pub mysql: MySqlOverrides,
}

impl ExtractArgs {
    fn apply(&self, cfg: &mut Config) {
        self.mysql.apply(&mut cfg.mysql);
        if self.no_mysql {
            cfg.mysql.enabled = false;
        }
        if self.no_neo4j {
            cfg.neo4j.enabled = false;
        }
        if self.no_llm || self.offline {
            cfg.llm.enabled = false;
        }
        let ex = &mut cfg.extraction;
        if let Some(n) = self.batch_size {
            ex.batch_size = n;
        }
        if let Some(n) = self.min_concepts {
            ex.min_concepts = n;
        }
        if let Some(n) = self.max_concepts {
            ex.max_concepts = n;
        }
        if let Some(t) = self.dedup_threshold {
            ex.dedup_threshold = t;
        }
        if let Some(dir) = &self.cache_dir {
            cfg.paths.cache_dir = dir.clone();
        }
        if let Some(dir) = &self.log_dir {
            cfg.paths.log_dir = dir.clone();
        }
    }

    fn batch_options(&self, cfg: &Config) -> BatchOptions {
        BatchOptions {
            limit: self.limit,
            offset: self.offset,
            resume: self.resume,
            ..BatchOptions::from_config(cfg)
        }
    }
}

async fn open_paper_store(cfg: &Config) -> anyhow::Result<Arc<dyn PaperStore>> {
    if !cfg.mysql.enabled {
        info!(dir = %cfg.paths.papers_dir.display(), "Reading papers from the JSON store");
        return Ok(Arc::new(JsonPaperStore::new(&cfg.paths.papers_dir)?));
    }
    let store = MySqlPaperStore::connect(&cfg.mysql).await.context("connecting to MySQL")?;
    Ok(Arc::new(store))
}

pub async fn run(args: ExtractArgs, mut cfg: Config) -> anyhow::Result<()> {
    args.apply(&mut cfg);

    let backend = build_llm_backend(&cfg);
    let dedup = Deduplicator::new(build_embedder(&cfg), cfg.extraction.dedup_threshold)?;
    let store = open_paper_store(&cfg).await?;
    let graph = build_graph_store(&cfg.neo4j);
    if graph.is_enabled() {
        if let Err(e) = graph.initialize_schema().await {
            warn!(error = %e, "Neo4j schema setup failed");
        }
    }

    let llm = LlmExtractor::new(backend.clone(), ResponseCache::new(&cfg.paths.cache_dir)?)
        .offline(args.offline)
        .with_max_prompt_chars(cfg.extraction.max_prompt_chars);
    let pipeline = ConceptExtractionPipeline::new(
        llm,
        HeuristicExtractor::new(cfg.extraction.heuristic_max_concepts),
        dedup,
        ConceptSummarizer::new(backend),
        store,
        graph,
    );

    let opts = args.batch_options(&cfg);
    let summary = match &args.paper_id {
        Some(paper_id) => run_single(&pipeline, paper_id, &opts).await?,
        None => run_batch(&pipeline, &opts).await?,
    };
    info!(csv = %summary.csv_path.display(), "Extraction finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ExtractArgs,
    }

    fn parse(argv: &[&str]) -> ExtractArgs {
        Harness::parse_from(std::iter::once("extract").chain(argv.iter().copied())).args
    }

    #[test]
    fn test_offline_and_no_llm_disable_backend() {
        for flag in ["--offline", "--no-llm"] {
            let mut cfg = Config::default();
            cfg.llm.api_key = Some("sk-test".into());
            parse(&[flag]).apply(&mut cfg);
            assert!(!cfg.llm.is_usable(), "{flag} should disable the LLM");
        }
    }

    #[test]
    fn test_extraction_overrides() {
        let mut cfg = Config::default();
        let args = parse(&[
            "--batch-size", "10", "--min-concepts", "2", "--max-concepts", "8", "--dedup-threshold", "0.9",
            "--cache-dir", "/tmp/cache", "--log-dir", "/tmp/logs", "--limit", "40", "--offset", "5",
        ]);
        args.apply(&mut cfg);
        let opts = args.batch_options(&cfg);
        assert_eq!(opts.batch_size, 10);
        assert_eq!(opts.min_concepts, 2);
        assert_eq!(opts.max_concepts, 8);
        assert_eq!(opts.limit, 40);
        assert_eq!(opts.offset, 5);
        assert_eq!(opts.log_dir, PathBuf::from("/tmp/logs"));
        assert_eq!(cfg.paths.cache_dir, PathBuf::from("/tmp/cache"));
        assert_eq!(cfg.extraction.dedup_threshold, 0.9);
    }

    #[test]
    fn test_defaults_keep_config_values() {
        let cfg = Config::default();
        let opts = parse(&[]).batch_options(&cfg);
        assert_eq!(opts.limit, 500);
        assert_eq!(opts.batch_size, 50);
        assert_eq!(opts.checkpoint_path, PathBuf::from("data/concepts/checkpoint.json"));
        assert!(!opts.resume);
    }
}
