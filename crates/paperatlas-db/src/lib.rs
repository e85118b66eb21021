//! PaperAtlas storage layer.
//!
//! - [`PaperStore`]: papers and concept rows, backed by MySQL
//!   ([`MySqlPaperStore`]) or a directory of JSON files ([`JsonPaperStore`]).
//! - [`GraphStore`]: `Paper`/`Concept` nodes in Neo4j ([`Neo4jGraphStore`]),
//!   or [`DisabledGraphStore`] when no graph is configured.

pub mod error;
pub mod graph;
pub mod json_store;
pub mod mysql;
pub mod store;

pub use error::{DbError, Result};
pub use graph::{build_graph_store, DisabledGraphStore, GraphStore, Neo4jGraphStore};
pub use json_store::{JsonPaperStore, StoredPaper};
pub use mysql::MySqlPaperStore;
pub use store::PaperStore;
