//! paperatlas-common: shared types, errors, and identifier helpers used across all PaperAtlas crates.

pub mod error;
pub mod ids;
pub mod models;
pub mod sandbox;

// Re-export commonly used types
pub use error::{PaperAtlasError, Result};
pub use ids::{
    canonical_concept_id, canonical_paper_id, normalize_arxiv_id, normalize_concept_name,
    normalize_doi, safe_filename, sha1_hex,
};
pub use models::{
    CandidateSource, ConceptCandidate, ConceptRecord, ConceptSummary, PaperAuthor,
    PaperIdentifier, PaperMetadata, PaperRecord, PaperRow,
};
