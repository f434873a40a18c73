//! Dependency graph storage and traversal.
//!
//! An edge `source → target` means the source document references the
//! target. [`GraphStore::ancestors`] walks outgoing edges (what a document
//! depends on); [`GraphStore::descendants`] walks incoming edges (what
//! depends on it).

use std::collections::{BTreeMap, HashSet};

use rusqlite::{Connection, params};

use super::db::{IndexError, atomically};
use super::documents::parse_column;
use super::types::{Edge, GraphNode, RelationKind, TraversalLimits};
use crate::corpus::Relation;

/// Suffixes tried, in order, when a reference omits the file extension.
pub const RESOLVE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".md"];

/// Result of replacing the edge set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub stored: usize,
    /// Edges dropped because an endpoint is not an indexed document.
    pub discarded: usize,
}

#[derive(Clone, Copy)]
enum Direction {
    Outgoing,
    Incoming,
}

pub struct GraphStore<'c> {
    conn: &'c Connection,
    limits: TraversalLimits,
}

impl<'c> GraphStore<'c> {
    pub fn new(conn: &'c Connection, limits: TraversalLimits) -> Self {
        Self { conn, limits }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Candidates
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the stored reference candidates of one document.
    pub fn record_candidates(&self, source: &str, relations: &[Relation]) -> Result<usize, IndexError> {
        atomically(self.conn, "record_candidates", || {
            self.conn.execute("DELETE FROM relation_candidates WHERE source_path = ?1", [source])?;
            let mut stmt = self.conn.prepare_cached(
                "INSERT INTO relation_candidates (source_path, target_path, relation, line_number, raw_text)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for rel in relations {
                stmt.execute(params![
                    source,
                    rel.resolved_path,
                    rel.kind.as_str(),
                    rel.line_number,
                    rel.raw_text,
                ])?;
            }
            Ok(relations.len())
        })
    }

    /// Every stored candidate, as an unvalidated edge.
    pub fn candidates(&self) -> Result<Vec<Edge>, IndexError> {
        let mut stmt = self.conn.prepare(
            "SELECT source_path, target_path, relation, line_number, raw_text
             FROM relation_candidates ORDER BY source_path, line_number",
        )?;
        let edges = stmt.query_map([], Self::row_to_edge)?.collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Edges
    // ─────────────────────────────────────────────────────────────────────────

    /// Atomically replace the whole edge set.
    ///
    /// Edges whose endpoints are not both indexed documents are discarded,
    /// as are repeats of an already stored (source, target, relation).
    pub fn replace_all(&self, edges: &[Edge]) -> Result<ReplaceOutcome, IndexError> {
        atomically(self.conn, "replace_edges", || {
            self.conn.execute("DELETE FROM edges", [])?;
            let mut stmt = self.conn.prepare_cached(
                "INSERT OR IGNORE INTO edges (source_path, target_path, relation, line_number, raw_text)
                 SELECT ?1, ?2, ?3, ?4, ?5
                 WHERE EXISTS (SELECT 1 FROM documents WHERE path = ?1)
                   AND EXISTS (SELECT 1 FROM documents WHERE path = ?2)",
            )?;

            let mut stored = 0;
            for edge in edges {
                stored += stmt.execute(params![
                    edge.source_path,
                    edge.target_path,
                    edge.relation.as_str(),
                    edge.line_number,
                    edge.raw_text,
                ])?;
            }

            let outcome = ReplaceOutcome { stored, discarded: edges.len() - stored };
            if outcome.discarded > 0 {
                tracing::debug!("Discarded {} edges with unindexed endpoints", outcome.discarded);
            }
            Ok(outcome)
        })
    }

    /// Edges leaving a document, ordered by line.
    pub fn outgoing(&self, path: &str) -> Result<Vec<Edge>, IndexError> {
        self.query_edges(
            "SELECT source_path, target_path, relation, line_number, raw_text
             FROM edges WHERE source_path = ?1 ORDER BY line_number, target_path",
            path,
        )
    }

    /// Edges pointing at a document, ordered by source.
    pub fn incoming(&self, path: &str) -> Result<Vec<Edge>, IndexError> {
        self.query_edges(
            "SELECT source_path, target_path, relation, line_number, raw_text
             FROM edges WHERE target_path = ?1 ORDER BY source_path, line_number",
            path,
        )
    }

    pub fn list_all(&self) -> Result<Vec<Edge>, IndexError> {
        let mut stmt = self.conn.prepare(
            "SELECT source_path, target_path, relation, line_number, raw_text
             FROM edges ORDER BY source_path, target_path, relation",
        )?;
        let edges = stmt.query_map([], Self::row_to_edge)?.collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    pub fn count(&self) -> Result<usize, IndexError> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn query_edges(&self, sql: &str, path: &str) -> Result<Vec<Edge>, IndexError> {
        let mut stmt = self.conn.prepare(sql)?;
        let edges = stmt.query_map([path], Self::row_to_edge)?.collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    fn row_to_edge(row: &rusqlite::Row) -> Result<Edge, rusqlite::Error> {
        let relation: String = row.get(2)?;
        Ok(Edge {
            source_path: row.get(0)?,
            target_path: row.get(1)?,
            relation: parse_column(2, &relation)?,
            line_number: row.get(3)?,
            raw_text: row.get(4)?,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Traversal
    // ─────────────────────────────────────────────────────────────────────────

    /// Documents `path` depends on, directly or transitively.
    ///
    /// Each node appears once, at its minimum hop count. The root is never
    /// part of the result, even when a cycle leads back to it.
    pub fn ancestors(&self, path: &str, max_depth: Option<u32>) -> Result<Vec<GraphNode>, IndexError> {
        self.traverse(path, max_depth, Direction::Outgoing)
    }

    /// Documents that depend on `path`, directly or transitively.
    pub fn descendants(&self, path: &str, max_depth: Option<u32>) -> Result<Vec<GraphNode>, IndexError> {
        self.traverse(path, max_depth, Direction::Incoming)
    }

    pub fn limits(&self) -> TraversalLimits {
        self.limits
    }

    fn traverse(
        &self,
        root: &str,
        max_depth: Option<u32>,
        direction: Direction,
    ) -> Result<Vec<GraphNode>, IndexError> {
        let depth = max_depth.unwrap_or(self.limits.default_depth);
        if depth == 0 || depth > self.limits.max_depth {
            return Err(IndexError::DepthOutOfRange { requested: depth, max: self.limits.max_depth });
        }

        // (from, to) columns: the walk moves from the `from` end of an edge to its `to` end
        let (from, to) = match direction {
            Direction::Outgoing => ("source_path", "target_path"),
            Direction::Incoming => ("target_path", "source_path"),
        };

        // UNION drops repeated (path, depth) rows and the depth bound stops
        // cycles from recursing forever.
        let sql = format!(
            "WITH RECURSIVE walk(path, depth) AS (
                SELECT {to}, 1 FROM edges WHERE {from} = ?1
                UNION
                SELECT e.{to}, walk.depth + 1
                FROM edges e JOIN walk ON e.{from} = walk.path
                WHERE walk.depth < ?2
            )
            SELECT path, MIN(depth) AS depth FROM walk
            WHERE path <> ?1
            GROUP BY path
            ORDER BY depth, path"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let nodes = stmt
            .query_map(params![root, depth], |row| {
                Ok(GraphNode { path: row.get(0)?, depth: row.get(1)? })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(nodes)
    }
}

/// Resolve candidates against the set of indexed paths.
///
/// Targets are matched exactly first, then with each of
/// [`RESOLVE_EXTENSIONS`] appended, then as a directory `index` file.
/// Unresolvable candidates and self-references are dropped. Repeated
/// (source, target, relation) triples collapse to their first line. The
/// result is sorted by source, target and relation.
pub fn derive_edges(candidates: Vec<Edge>, known_paths: &HashSet<String>) -> Vec<Edge> {
    let mut edges: BTreeMap<(String, String, RelationKind), Edge> = BTreeMap::new();

    for mut candidate in candidates {
        if !known_paths.contains(&candidate.source_path) {
            continue;
        }
        let Some(target) = resolve_target(&candidate.target_path, known_paths) else {
            continue;
        };
        if target == candidate.source_path {
            continue;
        }
        candidate.target_path = target;

        let key =
            (candidate.source_path.clone(), candidate.target_path.clone(), candidate.relation);
        match edges.get(&key) {
            Some(existing) if existing.line_number <= candidate.line_number => {}
            _ => {
                edges.insert(key, candidate);
            }
        }
    }

    edges.into_values().collect()
}

fn resolve_target(target: &str, known_paths: &HashSet<String>) -> Option<String> {
    if known_paths.contains(target) {
        return Some(target.to_string());
    }
    RESOLVE_EXTENSIONS
        .iter()
        .map(|ext| format!("{target}{ext}"))
        .chain(RESOLVE_EXTENSIONS.iter().map(|ext| format!("{target}/index{ext}")))
        .find(|candidate| known_paths.contains(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::Frontmatter;
    use crate::index::IndexDb;
    use crate::index::types::{Document, DocumentKind};
    use chrono::Utc;

    fn doc(path: &str) -> Document {
        Document {
            path: path.to_string(),
            kind: DocumentKind::Other,
            frontmatter: Frontmatter::default(),
            body: String::new(),
            content_hash: crate::corpus::content_hash_str(path),
            byte_size: 0,
            modified_at: Utc::now(),
        }
    }

    fn edge(source: &str, target: &str) -> Edge {
        edge_at(source, target, RelationKind::StaticImport, 1)
    }

    fn edge_at(source: &str, target: &str, relation: RelationKind, line: u32) -> Edge {
        Edge {
            source_path: source.to_string(),
            target_path: target.to_string(),
            relation,
            line_number: line,
            raw_text: format!("import '{target}'"),
        }
    }

    fn graph_db(paths: &[&str], edges: &[Edge]) -> IndexDb {
        let db = IndexDb::open_in_memory().unwrap();
        let docs: Vec<_> = paths.iter().map(|p| doc(p)).collect();
        db.documents().upsert_batch(&docs).unwrap();
        db.graph().replace_all(edges).unwrap();
        db
    }

    fn nodes(found: Vec<GraphNode>) -> Vec<(String, u32)> {
        found.into_iter().map(|n| (n.path, n.depth)).collect()
    }

    #[test]
    fn descendants_follow_incoming_edges() {
        let db = graph_db(
            &["a.js", "b.js", "c.js"],
            &[edge("a.js", "b.js"), edge("b.js", "c.js")],
        );

        let found = db.graph().descendants("c.js", Some(2)).unwrap();
        assert_eq!(nodes(found), [("b.js".into(), 1), ("a.js".into(), 2)]);

        let found = db.graph().descendants("c.js", Some(1)).unwrap();
        assert_eq!(nodes(found), [("b.js".into(), 1)]);
    }

    #[test]
    fn ancestors_follow_outgoing_edges() {
        let db = graph_db(
            &["a.js", "b.js", "c.js"],
            &[edge("a.js", "b.js"), edge("b.js", "c.js")],
        );

        let found = db.graph().ancestors("a.js", None).unwrap();
        assert_eq!(nodes(found), [("b.js".into(), 1), ("c.js".into(), 2)]);
        assert!(db.graph().ancestors("c.js", None).unwrap().is_empty());
    }

    #[test]
    fn cycles_terminate_and_exclude_root() {
        let db = graph_db(&["a.md", "b.md"], &[edge("a.md", "b.md"), edge("b.md", "a.md")]);

        let found = db.graph().descendants("a.md", Some(5)).unwrap();
        assert_eq!(nodes(found), [("b.md".into(), 1)]);
        let found = db.graph().ancestors("a.md", Some(10)).unwrap();
        assert_eq!(nodes(found), [("b.md".into(), 1)]);
    }

    #[test]
    fn diamond_reports_minimum_depth() {
        // a -> b -> d, a -> c -> d, a -> d
        let db = graph_db(
            &["a", "b", "c", "d"],
            &[edge("a", "b"), edge("b", "d"), edge("a", "c"), edge("c", "d"), edge("a", "d")],
        );

        let found = db.graph().ancestors("a", Some(3)).unwrap();
        assert_eq!(nodes(found), [("b".into(), 1), ("c".into(), 1), ("d".into(), 1)]);
    }

    #[test]
    fn depth_outside_limits_is_rejected() {
        let db = graph_db(&["a"], &[]);
        let graph = db.graph();

        assert!(matches!(
            graph.ancestors("a", Some(0)),
            Err(IndexError::DepthOutOfRange { requested: 0, max: 10 })
        ));
        assert!(matches!(
            graph.descendants("a", Some(11)),
            Err(IndexError::DepthOutOfRange { requested: 11, max: 10 })
        ));
    }

    #[test]
    fn unknown_root_yields_empty_result() {
        let db = graph_db(&["a"], &[]);
        assert!(db.graph().ancestors("missing.md", None).unwrap().is_empty());
    }

    #[test]
    fn replace_all_discards_dangling_edges() {
        let db = graph_db(&["a.md", "b.md"], &[]);
        let outcome = db
            .graph()
            .replace_all(&[edge("a.md", "b.md"), edge("a.md", "ghost.md"), edge("ghost.md", "b.md")])
            .unwrap();

        assert_eq!(outcome, ReplaceOutcome { stored: 1, discarded: 2 });
        assert_eq!(db.graph().list_all().unwrap(), vec![edge("a.md", "b.md")]);
    }

    #[test]
    fn replace_all_swaps_the_whole_set() {
        let db = graph_db(&["a", "b", "c"], &[edge("a", "b")]);
        db.graph().replace_all(&[edge("b", "c")]).unwrap();

        assert_eq!(db.graph().list_all().unwrap(), vec![edge("b", "c")]);
        assert_eq!(db.graph().count().unwrap(), 1);
    }

    #[test]
    fn deleting_a_document_removes_its_edges() {
        let db = graph_db(&["a", "b", "c"], &[edge("a", "b"), edge("b", "c")]);
        db.documents().delete("b").unwrap();
        assert_eq!(db.graph().count().unwrap(), 0);
    }

    #[test]
    fn outgoing_and_incoming() {
        let db = graph_db(
            &["a", "b", "c"],
            &[
                edge_at("a", "c", RelationKind::StaticImport, 4),
                edge_at("a", "b", RelationKind::RequireStyle, 2),
                edge_at("b", "c", RelationKind::Reference, 9),
            ],
        );
        let graph = db.graph();

        let out: Vec<_> = graph.outgoing("a").unwrap().into_iter().map(|e| e.target_path).collect();
        assert_eq!(out, ["b", "c"]);

        let inc: Vec<_> = graph.incoming("c").unwrap().into_iter().map(|e| e.source_path).collect();
        assert_eq!(inc, ["a", "b"]);
    }

    #[test]
    fn candidates_are_replaced_per_source() {
        let db = graph_db(&["src/a.js", "src/b.js"], &[]);
        let graph = db.graph();
        let first = crate::corpus::extract_relations("import b from './b.js';\n", "src/a.js");
        let second = crate::corpus::extract_relations("\n\nrequire('./c');\n", "src/a.js");

        graph.record_candidates("src/a.js", &first).unwrap();
        graph.record_candidates("src/a.js", &second).unwrap();

        let stored = graph.candidates().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].target_path, "src/c");
        assert_eq!(stored[0].relation, RelationKind::RequireStyle);
        assert_eq!(stored[0].line_number, 3);
    }

    #[test]
    fn derive_edges_resolves_extensions_and_index_files() {
        let known: HashSet<String> =
            ["src/a.js", "src/util.ts", "src/lib/index.js", "docs/guide.md"]
                .into_iter()
                .map(String::from)
                .collect();
        let candidates = vec![
            edge_at("src/a.js", "src/util", RelationKind::StaticImport, 1),
            edge_at("src/a.js", "src/lib", RelationKind::DynamicImport, 2),
            edge_at("src/a.js", "docs/guide.md", RelationKind::Reference, 3),
            edge_at("src/a.js", "src/missing", RelationKind::StaticImport, 4),
            edge_at("src/a.js", "src/a.js", RelationKind::StaticImport, 5),
        ];

        let derived: Vec<_> = derive_edges(candidates, &known)
            .into_iter()
            .map(|e| (e.target_path, e.relation))
            .collect();
        assert_eq!(
            derived,
            [
                ("docs/guide.md".into(), RelationKind::Reference),
                ("src/lib/index.js".into(), RelationKind::DynamicImport),
                ("src/util.ts".into(), RelationKind::StaticImport),
            ]
        );
    }

    #[test]
    fn derive_edges_keeps_first_occurrence() {
        let known: HashSet<String> = ["a", "b"].into_iter().map(String::from).collect();
        let candidates = vec![
            edge_at("a", "b", RelationKind::StaticImport, 7),
            edge_at("a", "b", RelationKind::StaticImport, 3),
            edge_at("a", "b", RelationKind::DynamicImport, 9),
        ];

        let derived = derive_edges(candidates, &known);
        assert_eq!(derived.len(), 2);
        assert_eq!(derived[0].line_number, 3);
        assert_eq!(derived[1].relation, RelationKind::DynamicImport);
    }
}
