//! Concept pipeline error types.

use paperatlas_db::DbError;
use paperatlas_llm::LlmError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConceptError>;

#[derive(Debug, Error)]
pub enum ConceptError {
    /// The model call failed; fatal for the paper being processed.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Storage error: {0}")]
    Db(#[from] DbError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("dedup threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f32),

    #[error("No paper found for paper_id={0}")]
    PaperNotFound(String),
}
