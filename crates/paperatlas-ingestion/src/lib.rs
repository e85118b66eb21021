//! paperatlas-ingestion: paper discovery, PDF text extraction and storage.
//!
//! Sources: arXiv (Atom API), Crossref and OpenAlex (JSON APIs). Every
//! ingested paper lands in the JSON paper store, optionally in MySQL, and
//! as a `Paper` node in the graph.

pub mod pdf_parser;
pub mod pipeline;
pub mod sources;

pub use pdf_parser::parse_pdf_bytes;
pub use pipeline::{identifier_from_url, IngestionPipeline};
pub use sources::arxiv::ArxivClient;
pub use sources::crossref::CrossRefClient;
pub use sources::openalex::OpenAlexClient;
pub use sources::LiteratureSource;
