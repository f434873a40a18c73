//! Full-text search over document frontmatter and body.
//!
//! Backed by an FTS5 table using the porter stemmer, so "authenticate",
//! "authenticated" and "authentication" all match one another. Hits are
//! ranked by BM25.

use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde_json::Value;

use super::db::IndexError;
use super::documents::parse_column;
use super::types::{Document, MatchMode, SearchHit, SearchQuery};

/// Upper bound on terms in one query.
pub const MAX_QUERY_TERMS: usize = 32;

pub struct FullTextIndex<'c> {
    conn: &'c Connection,
}

impl<'c> FullTextIndex<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Replace the indexed text of a stored document.
    pub fn index(&self, path: &str, text: &str) -> Result<(), IndexError> {
        let id: i64 = self
            .conn
            .query_row("SELECT id FROM documents WHERE path = ?1", [path], |row| row.get(0))
            .optional()?
            .ok_or_else(|| IndexError::DocumentNotFound(path.to_string()))?;
        self.index_row(id, text)
    }

    /// Replace the indexed text under a document id.
    pub(crate) fn index_row(&self, id: i64, text: &str) -> Result<(), IndexError> {
        self.conn.execute("DELETE FROM documents_fts WHERE rowid = ?1", [id])?;
        self.conn
            .execute("INSERT INTO documents_fts (rowid, content) VALUES (?1, ?2)", params![id, text])?;
        Ok(())
    }

    pub fn remove(&self, path: &str) -> Result<bool, IndexError> {
        let rows = self.conn.execute(
            "DELETE FROM documents_fts WHERE rowid = (SELECT id FROM documents WHERE path = ?1)",
            [path],
        )?;
        Ok(rows > 0)
    }

    pub(crate) fn remove_row(&self, id: i64) -> Result<(), IndexError> {
        self.conn.execute("DELETE FROM documents_fts WHERE rowid = ?1", [id])?;
        Ok(())
    }

    /// The text currently indexed for a path.
    pub fn indexed_text(&self, path: &str) -> Result<Option<String>, IndexError> {
        self.conn
            .query_row(
                "SELECT documents_fts.content
                 FROM documents
                 JOIN documents_fts ON documents_fts.rowid = documents.id
                 WHERE documents.path = ?1",
                [path],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn count(&self) -> Result<usize, IndexError> {
        let count: i64 =
            self.conn.query_row("SELECT COUNT(*) FROM documents_fts", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Paths matching every term, most relevant first.
    pub fn query(&self, terms: &str) -> Result<Vec<String>, IndexError> {
        let hits = self.search(&SearchQuery::new(terms))?;
        Ok(hits.into_iter().map(|hit| hit.path).collect())
    }

    /// Run a ranked search.
    ///
    /// Ties in score are broken by path so results are deterministic.
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, IndexError> {
        let expression = match_expression(&query.text, query.mode)?;
        let limit = query.limit.map_or(-1, i64::from);

        let mut stmt = self.conn.prepare(
            "SELECT documents.path, documents.kind, bm25(documents_fts) AS rank,
                    snippet(documents_fts, 0, '[', ']', '…', 12)
             FROM documents_fts
             JOIN documents ON documents.id = documents_fts.rowid
             WHERE documents_fts MATCH ?1
               AND (?2 IS NULL OR documents.kind = ?2)
             ORDER BY rank, documents.path
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(
            params![expression, query.kind.map(|k| k.as_str()), limit],
            |row| {
                let kind: String = row.get(1)?;
                let rank: f64 = row.get(2)?;
                Ok(SearchHit {
                    path: row.get(0)?,
                    kind: parse_column(1, &kind)?,
                    score: -rank,
                    snippet: row.get(3)?,
                })
            },
        );

        rows.and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| match_error(e, &expression))
    }
}

/// Classify a failure while evaluating a MATCH expression.
///
/// FTS5 reports expressions it cannot parse as a plain `SQLITE_ERROR`; busy,
/// locked, I/O and corruption failures keep their own codes.
fn match_error(e: rusqlite::Error, expression: &str) -> IndexError {
    match e {
        rusqlite::Error::SqliteFailure(ref failure, ref message)
            if failure.code == ErrorCode::Unknown =>
        {
            tracing::warn!("Rejected search expression {:?}: {}", expression, e);
            IndexError::InvalidQuery(message.clone().unwrap_or_else(|| e.to_string()))
        }
        e => e.into(),
    }
}

/// Build an FTS5 match expression from free text.
///
/// Each run of letters or digits becomes a quoted term, so user input can
/// never inject FTS5 operators. A `*` directly after a word makes it a prefix
/// term.
pub fn match_expression(text: &str, mode: MatchMode) -> Result<String, IndexError> {
    let mut terms = Vec::new();
    let mut word = String::new();

    for c in text.chars() {
        if c.is_alphanumeric() {
            word.push(c);
            continue;
        }
        if !word.is_empty() {
            terms.push(quote_term(&word, c == '*'));
            word.clear();
        }
    }
    if !word.is_empty() {
        terms.push(quote_term(&word, false));
    }

    if terms.is_empty() {
        return Err(IndexError::InvalidQuery(format!("no searchable terms in {:?}", text)));
    }
    if terms.len() > MAX_QUERY_TERMS {
        return Err(IndexError::InvalidQuery(format!(
            "{} terms exceeds the limit of {}",
            terms.len(),
            MAX_QUERY_TERMS
        )));
    }

    let joiner = match mode {
        MatchMode::All => " AND ",
        MatchMode::Any => " OR ",
    };
    Ok(terms.join(joiner))
}

fn quote_term(word: &str, prefix: bool) -> String {
    if prefix { format!("\"{word}\"*") } else { format!("\"{word}\"") }
}

/// The text indexed for a document: flattened frontmatter, then the body.
pub fn searchable_text(doc: &Document) -> String {
    let mut text = String::new();
    for (key, value) in &doc.frontmatter.fields {
        text.push_str(key);
        text.push_str(": ");
        flatten_value(value, &mut text);
        text.push('\n');
    }
    if !text.is_empty() {
        text.push('\n');
    }
    text.push_str(&doc.body);
    text
}

fn flatten_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => out.push_str(s),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                flatten_value(item, out);
            }
        }
        Value::Object(map) => {
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(key);
                out.push(' ');
                flatten_value(item, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::Frontmatter;
    use crate::index::IndexDb;
    use crate::index::types::DocumentKind;
    use chrono::Utc;
    use rstest::rstest;
    use serde_json::json;

    fn doc(path: &str, kind: DocumentKind, fields: Value, body: &str) -> Document {
        let fields = match fields {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Document {
            path: path.to_string(),
            kind,
            frontmatter: Frontmatter { fields },
            body: body.to_string(),
            content_hash: crate::corpus::content_hash_str(body),
            byte_size: body.len() as u64,
            modified_at: Utc::now(),
        }
    }

    fn seeded() -> IndexDb {
        let db = IndexDb::open_in_memory().unwrap();
        let docs = [
            doc(
                "rules/auth.md",
                DocumentKind::Rule,
                json!({"title": "Auth rules"}),
                "Always authenticate requests before touching the session.",
            ),
            doc(
                "tasks/login.md",
                DocumentKind::Task,
                json!({"title": "Login flow"}),
                "Build the authentication screen. Authentication errors must be shown.",
            ),
            doc("README.md", DocumentKind::Other, json!({}), "Project overview and setup."),
        ];
        db.documents().upsert_batch(&docs).unwrap();
        db
    }

    #[rstest]
    #[case("alpha beta", MatchMode::All, r#""alpha" AND "beta""#)]
    #[case("alpha beta", MatchMode::Any, r#""alpha" OR "beta""#)]
    #[case("auth*", MatchMode::All, r#""auth"*"#)]
    #[case("NEAR(\"x\" OR y)", MatchMode::All, r#""NEAR" AND "x" AND "OR" AND "y""#)]
    #[case("don't", MatchMode::All, r#""don" AND "t""#)]
    fn builds_quoted_expressions(
        #[case] text: &str,
        #[case] mode: MatchMode,
        #[case] expected: &str,
    ) {
        assert_eq!(match_expression(text, mode).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("*** -- ()")]
    fn rejects_queries_without_terms(#[case] text: &str) {
        assert!(matches!(match_expression(text, MatchMode::All), Err(IndexError::InvalidQuery(_))));
    }

    #[test]
    fn rejects_oversized_queries() {
        let text = vec!["word"; MAX_QUERY_TERMS + 1].join(" ");
        assert!(matches!(match_expression(&text, MatchMode::Any), Err(IndexError::InvalidQuery(_))));
    }

    #[test]
    fn stemming_relates_word_forms() {
        let db = seeded();
        let paths = db.fulltext().query("authentication").unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&"rules/auth.md".to_string()));
        assert!(paths.contains(&"tasks/login.md".to_string()));
    }

    #[test]
    fn ranks_denser_matches_first() {
        let db = seeded();
        let hits = db.fulltext().search(&SearchQuery::new("authentication")).unwrap();
        assert_eq!(hits[0].path, "tasks/login.md");
        assert!(hits[0].score >= hits[1].score);
        assert!(hits[0].snippet.contains('['));
    }

    #[test]
    fn all_mode_requires_every_term() {
        let db = seeded();
        let fulltext = db.fulltext();

        assert_eq!(fulltext.query("authenticate session").unwrap(), ["rules/auth.md"]);

        let mut any = SearchQuery::new("session overview");
        any.mode = MatchMode::Any;
        let mut paths: Vec<_> = fulltext.search(&any).unwrap().into_iter().map(|h| h.path).collect();
        paths.sort();
        assert_eq!(paths, ["README.md", "rules/auth.md"]);
    }

    #[test]
    fn filters_by_kind_and_limit() {
        let db = seeded();
        let fulltext = db.fulltext();

        let mut query = SearchQuery::new("authentication");
        query.kind = Some(DocumentKind::Task);
        let hits = fulltext.search(&query).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, DocumentKind::Task);

        let mut query = SearchQuery::new("authentication");
        query.limit = Some(1);
        assert_eq!(fulltext.search(&query).unwrap().len(), 1);
    }

    #[test]
    fn frontmatter_is_searchable() {
        let db = seeded();
        assert_eq!(db.fulltext().query("login").unwrap(), ["tasks/login.md"]);
        assert_eq!(db.fulltext().query("proj*").unwrap(), ["README.md"]);
    }

    #[test]
    fn fulltext_rows_share_document_ids() {
        let db = seeded();
        let store = db.documents();
        store.delete("tasks/login.md").unwrap();
        store.upsert(&doc("tasks/login.md", DocumentKind::Task, json!({}), "Login again.")).unwrap();
        store.upsert(&doc("README.md", DocumentKind::Other, json!({}), "Rewritten overview.")).unwrap();

        let orphans: i64 = db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM documents_fts WHERE rowid NOT IN (SELECT id FROM documents)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
        assert_eq!(db.fulltext().count().unwrap(), store.count().unwrap());

        let fulltext = db.fulltext();
        assert_eq!(fulltext.indexed_text("README.md").unwrap().as_deref(), Some("Rewritten overview."));
        assert_eq!(fulltext.query("again").unwrap(), ["tasks/login.md"]);
        assert!(fulltext.query("screen").unwrap().is_empty());
    }

    #[test]
    fn search_looks_documents_up_by_id() {
        let db = seeded();
        let plan: Vec<String> = db
            .connection()
            .prepare(
                "EXPLAIN QUERY PLAN
                 SELECT documents.path FROM documents_fts
                 JOIN documents ON documents.id = documents_fts.rowid
                 WHERE documents_fts MATCH ?1",
            )
            .unwrap()
            .query_map(["\"auth\""], |row| row.get::<_, String>(3))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert!(plan.iter().any(|step| step.contains("USING INTEGER PRIMARY KEY")), "{plan:?}");
    }

    #[test]
    fn unparseable_match_is_invalid_query() {
        let db = seeded();
        let err = db
            .connection()
            .prepare("SELECT rowid FROM documents_fts WHERE documents_fts MATCH ?1")
            .unwrap()
            .query_map(["\"unterminated"], |row| row.get::<_, i64>(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();

        assert!(matches!(match_error(err, "\"unterminated"), IndexError::InvalidQuery(_)));
    }

    #[test]
    fn busy_database_is_not_invalid_query() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".into()),
        );
        assert!(matches!(match_error(busy, "\"x\""), IndexError::Database(_)));
    }

    #[test]
    fn searchable_text_flattens_frontmatter_before_body() {
        let d = doc(
            "a.md",
            DocumentKind::Other,
            json!({"tags": ["x", "y"], "meta": {"owner": "ana", "draft": true}, "n": 3}),
            "Body.",
        );
        insta::assert_snapshot!(searchable_text(&d), @r"
        meta: draft true owner ana
        n: 3
        tags: x y

        Body.
        ");
    }

    #[test]
    fn searchable_text_without_frontmatter_is_body() {
        let d = doc("a.md", DocumentKind::Other, json!({}), "Just text.");
        assert_eq!(searchable_text(&d), "Just text.");
    }
}
