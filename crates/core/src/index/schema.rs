//! SQLite schema definition and versioning.
//!
//! The index is a cache rebuilt from source files, so an outdated schema is
//! dropped and recreated rather than migrated.

use rusqlite::Connection;
use thiserror::Error;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Schema version {found} is newer than supported {supported}")]
    VersionTooNew { found: i32, supported: i32 },

    #[error("Schema version {found} does not match {expected}; run a sync to rebuild the index")]
    Outdated { found: i32, expected: i32 },
}

/// Initialize the schema, rebuilding it when the stored version is older.
pub fn init_schema(conn: &Connection) -> Result<(), SchemaError> {
    let version = get_schema_version(conn)?;

    if version > SCHEMA_VERSION {
        return Err(SchemaError::VersionTooNew { found: version, supported: SCHEMA_VERSION });
    }
    if version < SCHEMA_VERSION {
        if version > 0 {
            tracing::info!(
                "Index schema v{} is outdated, rebuilding as v{}",
                version,
                SCHEMA_VERSION
            );
        }
        rebuild_schema(conn)?;
    }

    Ok(())
}

/// Verify the schema without modifying it (for read-only handles).
pub fn check_schema(conn: &Connection) -> Result<(), SchemaError> {
    let version = get_schema_version(conn)?;
    if version > SCHEMA_VERSION {
        return Err(SchemaError::VersionTooNew { found: version, supported: SCHEMA_VERSION });
    }
    if version != SCHEMA_VERSION {
        return Err(SchemaError::Outdated { found: version, expected: SCHEMA_VERSION });
    }
    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32, SchemaError> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version WHERE id = 1", [], |row| row.get(0))
        .ok();

    Ok(version.unwrap_or(0))
}

fn rebuild_schema(conn: &Connection) -> Result<(), SchemaError> {
    conn.execute_batch(
        r#"
        BEGIN;

        DROP TABLE IF EXISTS documents_fts;
        DROP TABLE IF EXISTS edges;
        DROP TABLE IF EXISTS relation_candidates;
        DROP TABLE IF EXISTS documents;
        DROP TABLE IF EXISTS schema_version;

        -- Schema version tracking
        CREATE TABLE schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        -- Documents: one record per corpus file
        CREATE TABLE documents (
            id INTEGER PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            kind TEXT NOT NULL DEFAULT 'other',
            frontmatter_json TEXT NOT NULL DEFAULT '{}',
            body TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            byte_size INTEGER NOT NULL,
            modified_at TEXT NOT NULL
        );

        CREATE INDEX idx_documents_kind ON documents(kind);

        -- Local references found in each document, resolved but not validated.
        -- Rewritten whenever the source document is re-parsed.
        CREATE TABLE relation_candidates (
            source_path TEXT NOT NULL REFERENCES documents(path) ON DELETE CASCADE,
            target_path TEXT NOT NULL,
            relation TEXT NOT NULL,
            line_number INTEGER NOT NULL,
            raw_text TEXT NOT NULL
        );

        CREATE INDEX idx_candidates_source ON relation_candidates(source_path);

        -- Validated edges; both endpoints are indexed documents
        CREATE TABLE edges (
            source_path TEXT NOT NULL REFERENCES documents(path) ON DELETE CASCADE,
            target_path TEXT NOT NULL REFERENCES documents(path) ON DELETE CASCADE,
            relation TEXT NOT NULL,
            line_number INTEGER NOT NULL,
            raw_text TEXT NOT NULL,
            PRIMARY KEY (source_path, target_path, relation)
        );

        CREATE INDEX idx_edges_target ON edges(target_path);

        -- Full-text search over frontmatter + body, stemmed.
        -- Row ids match documents.id.
        CREATE VIRTUAL TABLE documents_fts USING fts5(
            content,
            tokenize = 'porter unicode61'
        );

        COMMIT;
        "#,
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}
