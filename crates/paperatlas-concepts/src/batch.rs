//! Batch driver: pages through the paper store, runs the pipeline on each
//! paper, and writes run logs plus a resume checkpoint.
//!
//! The checkpoint is rewritten after every paper, so an interrupted run
//! loses at most the paper in flight. `resume` restarts at the
//! checkpoint's `next_offset`. Single-process use only: two runs sharing a
//! checkpoint file will overwrite each other.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use paperatlas_common::{CandidateSource, ConceptRecord};
use paperatlas_config::Config;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConceptError, Result};
use crate::pipeline::ConceptExtractionPipeline;

pub const DEFAULT_LIMIT: usize = 500;

const CSV_HEADERS: [&str; 6] = ["paper_id", "concept_id", "concept_name", "summary", "bullets", "source"];
const CSV_BULLET_SEPARATOR: &str = " | ";

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub limit: usize,
    pub offset: usize,
    pub batch_size: usize,
    pub min_concepts: usize,
    pub max_concepts: usize,
    pub resume: bool,
    pub log_dir: PathBuf,
    pub checkpoint_path: PathBuf,
}

impl BatchOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            batch_size: cfg.extraction.batch_size,
            min_concepts: cfg.extraction.min_concepts,
            max_concepts: cfg.extraction.max_concepts,
            resume: false,
            log_dir: cfg.paths.log_dir.clone(),
            checkpoint_path: cfg.paths.checkpoint_path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub papers_processed: usize,
    pub concepts_extracted: usize,
    pub jsonl_path: PathBuf,
    pub csv_path: PathBuf,
}

// ── Checkpoint ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub next_offset: usize,
    #[serde(default)]
    pub last_paper_id: Option<String>,
}

impl Checkpoint {
    /// `None` when the file is missing or unreadable.
    pub fn load(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable checkpoint");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(cp) => Some(cp),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable checkpoint");
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

// ── Run log ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JsonLogRow<'a> {
    paper_id: &'a str,
    concept_id: &'a str,
    concept_name: &'a str,
    summary: &'a str,
    bullets: &'a [String],
    source: CandidateSource,
}

#[derive(Serialize)]
struct CsvLogRow<'a> {
    paper_id: &'a str,
    concept_id: &'a str,
    concept_name: &'a str,
    summary: &'a str,
    bullets: String,
    source: &'static str,
}

/// Paired `concepts_<stamp>.jsonl` / `.csv` files for one run.
pub struct RunLog {
    jsonl: BufWriter<File>,
    csv: csv::Writer<File>,
    jsonl_path: PathBuf,
    csv_path: PathBuf,
}

impl RunLog {
    pub fn create(dir: &Path, stamp: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let jsonl_path = dir.join(format!("concepts_{stamp}.jsonl"));
        let csv_path = dir.join(format!("concepts_{stamp}.csv"));

        let jsonl = BufWriter::new(File::create(&jsonl_path)?);
        let mut csv = csv::WriterBuilder::new().has_headers(false).from_path(&csv_path)?;
        csv.write_record(CSV_HEADERS)?;
        csv.flush()?;

        Ok(Self { jsonl, csv, jsonl_path, csv_path })
    }

    /// Log file named after the current UTC time.
    pub fn create_timestamped(dir: &Path) -> Result<Self> {
        Self::create(dir, &Utc::now().format("%Y%m%d_%H%M%S").to_string())
    }

    pub fn jsonl_path(&self) -> &Path {
        &self.jsonl_path
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    /// Append records to both files and flush.
    pub fn write_records(&mut self, records: &[ConceptRecord]) -> Result<()> {
        for record in records {
            let row = JsonLogRow {
                paper_id: &record.paper_id,
                concept_id: &record.concept_id,
                concept_name: &record.name,
                summary: &record.summary,
                bullets: &record.bullets,
                source: record.source,
            };
            serde_json::to_writer(&mut self.jsonl, &row)?;
            self.jsonl.write_all(b"\n")?;

            self.csv.serialize(CsvLogRow {
                paper_id: &record.paper_id,
                concept_id: &record.concept_id,
                concept_name: &record.name,
                summary: &record.summary,
                bullets: record.bullets.join(CSV_BULLET_SEPARATOR),
                source: record.source.as_str(),
            })?;
        }
        self.jsonl.flush()?;
        self.csv.flush()?;
        Ok(())
    }
}

// ── Driver ───────────────────────────────────────────────────────────────────

/// Warn when a paper's concept count falls outside `[min, max]`.
/// Returns whether the count was in range.
pub fn check_concept_count(paper_id: &str, n: usize, min: usize, max: usize) -> bool {
    if n < min || n > max {
        warn!("Paper {} yielded {} concepts (expected {}-{}).", paper_id, n, min, max);
        return false;
    }
    true
}

/// Process papers `[offset, offset + limit)` in pages of `batch_size`,
/// starting from the checkpoint when `resume` is set.
///
/// Stops at the first empty page. A pipeline error stops the run and
/// leaves the checkpoint pointing at the failed paper.
pub async fn run_batch(pipeline: &ConceptExtractionPipeline, opts: &BatchOptions) -> Result<BatchSummary> {
    let mut log = RunLog::create_timestamped(&opts.log_dir)?;

    let mut start = opts.offset;
    if opts.resume {
        if let Some(cp) = Checkpoint::load(&opts.checkpoint_path) {
            start = cp.next_offset;
            info!(
                "Resuming from checkpoint offset {} (paper_id={}).",
                start,
                cp.last_paper_id.as_deref().unwrap_or("-")
            );
        }
    }

    let end = opts.offset.saturating_add(opts.limit);
    let batch_size = opts.batch_size.max(1);
    let mut processed = 0usize;
    let mut extracted = 0usize;

    let mut batch_offset = start;
    while batch_offset < end {
        let page = batch_size.min(end - batch_offset);
        let rows = pipeline.store().fetch_papers(page, batch_offset).await?;
        if rows.is_empty() {
            break;
        }
        for (index, row) in rows.iter().enumerate() {
            let records = pipeline.process_paper(row).await?;
            processed += 1;
            extracted += records.len();
            check_concept_count(&row.paper_id, records.len(), opts.min_concepts, opts.max_concepts);
            log.write_records(&records)?;
            Checkpoint {
                next_offset: batch_offset + index + 1,
                last_paper_id: Some(row.paper_id.clone()),
            }
            .save(&opts.checkpoint_path)?;
        }
        batch_offset = batch_offset.saturating_add(batch_size);
    }

    info!(
        "Processed {} papers, extracted {} concepts. Logs: {}",
        processed,
        extracted,
        log.jsonl_path().display()
    );
    Ok(BatchSummary {
        papers_processed: processed,
        concepts_extracted: extracted,
        jsonl_path: log.jsonl_path().to_path_buf(),
        csv_path: log.csv_path().to_path_buf(),
    })
}

/// Process one paper by ID. No checkpoint is written.
pub async fn run_single(
    pipeline: &ConceptExtractionPipeline,
    paper_id: &str,
    opts: &BatchOptions,
) -> Result<BatchSummary> {
    let row = pipeline
        .store()
        .fetch_paper_by_id(paper_id)
        .await?
        .ok_or_else(|| ConceptError::PaperNotFound(paper_id.to_string()))?;
    let mut log = RunLog::create_timestamped(&opts.log_dir)?;
    let records = pipeline.process_paper(&row).await?;
    check_concept_count(&row.paper_id, records.len(), opts.min_concepts, opts.max_concepts);
    log.write_records(&records)?;

    info!(
        "Processed {} papers, extracted {} concepts. Logs: {}",
        1,
        records.len(),
        log.jsonl_path().display()
    );
    Ok(BatchSummary {
        papers_processed: 1,
        concepts_extracted: records.len(),
        jsonl_path: log.jsonl_path().to_path_buf(),
        csv_path: log.csv_path().to_path_buf(),
    })
}
