//! Storage error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("MySQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Neo4j error [{code}]: {message}")]
    Neo4j { code: String, message: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),
}

impl From<paperatlas_common::PaperAtlasError> for DbError {
    fn from(err: paperatlas_common::PaperAtlasError) -> Self {
        match err {
            paperatlas_common::PaperAtlasError::Http(e) => DbError::Http(e),
            other => DbError::Unavailable(other.to_string()),
        }
    }
}
