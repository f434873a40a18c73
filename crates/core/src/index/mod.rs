//! Knowledge index: documents, their dependency graph and full-text search.
//!
//! All three live in one SQLite file and are only mutated together, inside
//! the write transaction of a sync:
//! - [`DocumentStore`]: one record per corpus file, keyed by relative path
//! - [`GraphStore`]: validated references between documents
//! - [`FullTextIndex`]: stemmed, BM25-ranked search over frontmatter and body
//!
//! # Example
//!
//! ```no_run
//! use kbindex_core::index::{IndexDb, SearchQuery, SyncEngine};
//! use std::path::Path;
//!
//! let mut db = IndexDb::open(Path::new("corpus/.kbindex/index.db")).unwrap();
//! let report = SyncEngine::new("corpus").incremental(&mut db).unwrap();
//! println!("{} updated, {} unchanged", report.updated, report.unchanged);
//!
//! let hits = db.fulltext().search(&SearchQuery::new("authentication")).unwrap();
//! let dependents = db.graph().descendants("src/auth.ts", Some(2)).unwrap();
//! ```

pub mod db;
pub mod documents;
pub mod fulltext;
pub mod graph;
pub mod schema;
pub mod sync;
pub mod types;

pub use db::{IndexDb, IndexError, IndexTransaction};
pub use documents::DocumentStore;
pub use fulltext::{FullTextIndex, MAX_QUERY_TERMS, match_expression, searchable_text};
pub use graph::{GraphStore, RESOLVE_EXTENSIONS, ReplaceOutcome, derive_edges};
pub use schema::{SCHEMA_VERSION, SchemaError};
pub use sync::{
    FileChange, Progress, ProgressCallback, SyncEngine, SyncError, SyncMode, SyncPhase,
    SyncReport, SyncWarning, WarningKind, classify_change,
};
pub use types::{
    Document, DocumentKind, Edge, GraphNode, MatchMode, RelationKind, SearchHit, SearchQuery,
    TraversalLimits, UnknownVariant,
};
