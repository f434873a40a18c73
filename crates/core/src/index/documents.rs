//! Document records keyed by corpus-relative path.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};

use super::db::{IndexError, atomically};
use super::fulltext::{FullTextIndex, searchable_text};
use super::types::{Document, DocumentKind};

const SELECT_DOCUMENT: &str = "SELECT path, kind, frontmatter_json, body, content_hash, byte_size, modified_at
     FROM documents";

/// View over the `documents` table.
///
/// Every write also updates the full-text index, so the two never disagree
/// about which paths exist or what text they hold.
pub struct DocumentStore<'c> {
    conn: &'c Connection,
}

impl<'c> DocumentStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace a document and its searchable text.
    pub fn upsert(&self, doc: &Document) -> Result<(), IndexError> {
        atomically(self.conn, "upsert_document", || self.write(doc))
    }

    /// Upsert many documents; either all are stored or none are.
    pub fn upsert_batch(&self, docs: &[Document]) -> Result<usize, IndexError> {
        atomically(self.conn, "upsert_batch", || {
            for doc in docs {
                self.write(doc)?;
            }
            Ok(docs.len())
        })
    }

    /// Remove a document. Its edges, candidates and searchable text go with it.
    pub fn delete(&self, path: &str) -> Result<bool, IndexError> {
        atomically(self.conn, "delete_document", || {
            let Some(id) = self.id_of(path)? else {
                return Ok(false);
            };
            FullTextIndex::new(self.conn).remove_row(id)?;
            self.conn.execute("DELETE FROM documents WHERE id = ?1", [id])?;
            Ok(true)
        })
    }

    fn write(&self, doc: &Document) -> Result<(), IndexError> {
        let frontmatter_json = serde_json::to_string(&doc.frontmatter)?;
        let id: i64 = self.conn.query_row(
            "INSERT INTO documents (path, kind, frontmatter_json, body, content_hash, byte_size, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(path) DO UPDATE SET
                kind = excluded.kind,
                frontmatter_json = excluded.frontmatter_json,
                body = excluded.body,
                content_hash = excluded.content_hash,
                byte_size = excluded.byte_size,
                modified_at = excluded.modified_at
             RETURNING id",
            params![
                doc.path,
                doc.kind.as_str(),
                frontmatter_json,
                doc.body,
                doc.content_hash,
                i64::try_from(doc.byte_size).unwrap_or(i64::MAX),
                doc.modified_at.to_rfc3339(),
            ],
            |row| row.get(0),
        )?;
        FullTextIndex::new(self.conn).index_row(id, &searchable_text(doc))
    }

    fn id_of(&self, path: &str) -> Result<Option<i64>, IndexError> {
        self.conn
            .query_row("SELECT id FROM documents WHERE path = ?1", [path], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    pub fn get(&self, path: &str) -> Result<Option<Document>, IndexError> {
        self.conn
            .query_row(&format!("{SELECT_DOCUMENT} WHERE path = ?1"), [path], Self::row_to_document)
            .optional()
            .map_err(Into::into)
    }

    /// Like [`get`](Self::get), but a missing path is an error.
    pub fn require(&self, path: &str) -> Result<Document, IndexError> {
        self.get(path)?.ok_or_else(|| IndexError::DocumentNotFound(path.to_string()))
    }

    /// All documents, ordered by path.
    pub fn list_all(&self) -> Result<Vec<Document>, IndexError> {
        let mut stmt = self.conn.prepare(&format!("{SELECT_DOCUMENT} ORDER BY path"))?;
        let docs = stmt.query_map([], Self::row_to_document)?.collect::<Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    /// Documents of one kind, ordered by path.
    pub fn list_kind(&self, kind: DocumentKind) -> Result<Vec<Document>, IndexError> {
        let mut stmt =
            self.conn.prepare(&format!("{SELECT_DOCUMENT} WHERE kind = ?1 ORDER BY path"))?;
        let docs = stmt
            .query_map([kind.as_str()], Self::row_to_document)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    /// Stored content hash for every path (for change detection).
    pub fn hashes(&self) -> Result<HashMap<String, String>, IndexError> {
        let mut stmt = self.conn.prepare("SELECT path, content_hash FROM documents")?;
        let hashes = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(hashes)
    }

    pub fn count(&self) -> Result<usize, IndexError> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Count documents per kind, most common first.
    pub fn count_by_kind(&self) -> Result<Vec<(DocumentKind, usize)>, IndexError> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, COUNT(*) FROM documents GROUP BY kind ORDER BY COUNT(*) DESC, kind",
        )?;
        let counts = stmt
            .query_map([], |row| {
                let kind: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((parse_column(0, &kind)?, count as usize))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    fn row_to_document(row: &rusqlite::Row) -> Result<Document, rusqlite::Error> {
        let kind: String = row.get(1)?;
        let frontmatter_json: String = row.get(2)?;
        let byte_size: i64 = row.get(5)?;
        let modified: String = row.get(6)?;

        Ok(Document {
            path: row.get(0)?,
            kind: parse_column(1, &kind)?,
            frontmatter: serde_json::from_str(&frontmatter_json)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?,
            body: row.get(3)?,
            content_hash: row.get(4)?,
            byte_size: u64::try_from(byte_size).unwrap_or(0),
            modified_at: DateTime::parse_from_rfc3339(&modified)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?,
        })
    }
}

/// Parse a stored enum column, reporting bad values as conversion failures.
pub(crate) fn parse_column<T>(idx: usize, value: &str) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
