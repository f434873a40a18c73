//! Database connection, transactions and shared storage helpers.

use std::path::Path;

use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use thiserror::Error;

use super::documents::DocumentStore;
use super::fulltext::FullTextIndex;
use super::graph::GraphStore;
use super::schema::{SchemaError, check_schema, init_schema};
use super::types::TraversalLimits;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Failed to create index directory {0}: {1}")]
    CreateDir(String, #[source] std::io::Error),

    #[error("Failed to encode frontmatter: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Traversal depth {requested} is outside 1..={max}")]
    DepthOutOfRange { requested: u32, max: u32 },
}

/// Knowledge index database handle.
///
/// Holds the document table, the edge table and the full-text index in a
/// single SQLite file. Mutations go through [`IndexDb::transaction`]; reads
/// can use the store views directly.
pub struct IndexDb {
    conn: Connection,
    limits: TraversalLimits,
}

impl IndexDb {
    /// Open or create an index database at the given path.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| IndexError::CreateDir(parent.display().to_string(), e))?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        init_schema(&conn)?;
        Ok(Self { conn, limits: TraversalLimits::default() })
    }

    /// Open an existing index for queries only.
    ///
    /// Readers observe the last committed sync; a sync running in another
    /// process never exposes partial state to them.
    pub fn open_read_only(path: &Path) -> Result<Self, IndexError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        check_schema(&conn)?;
        Ok(Self { conn, limits: TraversalLimits::default() })
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(Self { conn, limits: TraversalLimits::default() })
    }

    /// Replace the traversal depth bounds.
    pub fn with_limits(mut self, limits: TraversalLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> TraversalLimits {
        self.limits
    }

    /// Get the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn documents(&self) -> DocumentStore<'_> {
        DocumentStore::new(&self.conn)
    }

    pub fn graph(&self) -> GraphStore<'_> {
        GraphStore::new(&self.conn, self.limits)
    }

    pub fn fulltext(&self) -> FullTextIndex<'_> {
        FullTextIndex::new(&self.conn)
    }

    /// Begin the single write transaction of an index update.
    ///
    /// Dropping the returned value without committing rolls every change back.
    pub fn transaction(&mut self) -> Result<IndexTransaction<'_>, IndexError> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(IndexTransaction { tx, limits: self.limits })
    }
}

/// An open write transaction spanning all three stores.
pub struct IndexTransaction<'a> {
    tx: Transaction<'a>,
    limits: TraversalLimits,
}

impl IndexTransaction<'_> {
    pub fn documents(&self) -> DocumentStore<'_> {
        DocumentStore::new(&self.tx)
    }

    pub fn graph(&self) -> GraphStore<'_> {
        GraphStore::new(&self.tx, self.limits)
    }

    pub fn fulltext(&self) -> FullTextIndex<'_> {
        FullTextIndex::new(&self.tx)
    }

    pub fn commit(self) -> Result<(), IndexError> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn rollback(self) -> Result<(), IndexError> {
        self.tx.rollback()?;
        Ok(())
    }
}

/// Run `f` inside a savepoint: its writes land together or not at all.
///
/// Works both inside an enclosing transaction and on a bare connection.
pub(crate) fn atomically<T>(
    conn: &Connection,
    name: &str,
    f: impl FnOnce() -> Result<T, IndexError>,
) -> Result<T, IndexError> {
    conn.execute_batch(&format!("SAVEPOINT {name}"))?;
    match f() {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name}"))?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) =
                conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))
            {
                tracing::error!("Failed to roll back savepoint {}: {}", name, rollback_err);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::Frontmatter;
    use crate::index::types::{Document, DocumentKind};
    use tempfile::TempDir;

    fn doc(path: &str, body: &str) -> Document {
        Document {
            path: path.to_string(),
            kind: DocumentKind::Other,
            frontmatter: Frontmatter::default(),
            body: body.to_string(),
            content_hash: crate::corpus::content_hash_str(body),
            byte_size: body.len() as u64,
            modified_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".kbindex/nested/index.db");

        let db = IndexDb::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.documents().count().unwrap(), 0);
    }

    #[test]
    fn test_read_only_requires_existing_index() {
        let dir = TempDir::new().unwrap();
        assert!(IndexDb::open_read_only(&dir.path().join("missing.db")).is_err());
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.db");
        let writer = IndexDb::open(&path).unwrap();
        writer.documents().upsert(&doc("a.md", "text")).unwrap();

        let reader = IndexDb::open_read_only(&path).unwrap();
        let result = reader.fulltext().index("a.md", "other text");
        assert!(matches!(result, Err(IndexError::Database(_))));
    }

    #[test]
    fn test_atomically_rolls_back_on_error() {
        let db = IndexDb::open_in_memory().unwrap();
        let conn = db.connection();

        let result: Result<(), IndexError> = atomically(conn, "test_sp", || {
            db.documents().upsert(&doc("a.md", "first"))?;
            Err(IndexError::InvalidQuery("boom".into()))
        });

        assert!(result.is_err());
        assert_eq!(db.documents().count().unwrap(), 0);
        assert_eq!(db.fulltext().count().unwrap(), 0);
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let mut db = IndexDb::open_in_memory().unwrap();
        {
            let tx = db.transaction().unwrap();
            tx.documents().upsert(&doc("a.md", "uncommitted")).unwrap();
        }
        assert_eq!(db.fulltext().count().unwrap(), 0);
    }

    #[test]
    fn test_fulltext_index_requires_document() {
        let db = IndexDb::open_in_memory().unwrap();
        assert!(matches!(
            db.fulltext().index("ghost.md", "text"),
            Err(IndexError::DocumentNotFound(_))
        ));

        db.documents().upsert(&doc("a.md", "original")).unwrap();
        db.fulltext().index("a.md", "replaced").unwrap();
        assert_eq!(db.fulltext().indexed_text("a.md").unwrap().as_deref(), Some("replaced"));
        assert_eq!(db.fulltext().count().unwrap(), 1);
    }
}
