//! Shared output formatting for query commands.

use kbindex_core::index::{Edge, GraphNode, SearchHit, SyncReport};
use serde::Serialize;

/// A direct reference as seen from one end.
#[derive(Debug, Serialize)]
pub struct LinkOutput {
    /// The document at the other end of the edge.
    pub path: String,
    pub relation: String,
    pub line_number: u32,
    pub raw_text: String,
}

impl LinkOutput {
    /// View an outgoing edge from its source.
    pub fn outgoing(edge: &Edge) -> Self {
        Self::with_peer(edge, &edge.target_path)
    }

    /// View an incoming edge from its target.
    pub fn incoming(edge: &Edge) -> Self {
        Self::with_peer(edge, &edge.source_path)
    }

    fn with_peer(edge: &Edge, peer: &str) -> Self {
        Self {
            path: peer.to_string(),
            relation: edge.relation.as_str().to_string(),
            line_number: edge.line_number,
            raw_text: edge.raw_text.clone(),
        }
    }
}

/// Pretty-print any serializable value as JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print search hits as a table.
pub fn print_hits_table(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("(no matches)");
        return;
    }

    let path_width = column_width(hits.iter().map(|h| h.path.as_str()), 4, 50);
    let kind_width = 9; // "story-map"

    println!("{:<path_width$}  {:<kind_width$}  {:>7}  SNIPPET", "PATH", "KIND", "SCORE");
    println!("{:-<path_width$}  {:-<kind_width$}  {:-<7}  {:-<7}", "", "", "", "");

    for hit in hits {
        println!(
            "{:<path_width$}  {:<kind_width$}  {:>7.3}  {}",
            truncate(&hit.path, path_width),
            hit.kind.as_str(),
            hit.score,
            truncate(&single_line(&hit.snippet), 60),
        );
    }

    println!();
    println!("-- {} matches --", hits.len());
}

/// Print traversal results as a table.
pub fn print_nodes_table(nodes: &[GraphNode], direction: &str) {
    if nodes.is_empty() {
        println!("(no {} found)", direction);
        return;
    }

    let path_width = column_width(nodes.iter().map(|n| n.path.as_str()), 4, 60);

    println!("{:>5}  PATH", "DEPTH");
    println!("{:-<5}  {:-<path_width$}", "", "");
    for node in nodes {
        println!("{:>5}  {}", node.depth, truncate(&node.path, path_width));
    }

    println!();
    println!("-- {} {} --", nodes.len(), direction);
}

/// Print links as a table.
pub fn print_links_table(links: &[LinkOutput], direction: &str) {
    if links.is_empty() {
        println!("(no {} found)", direction);
        return;
    }

    let path_width = column_width(links.iter().map(|l| l.path.as_str()), 4, 50);
    let relation_width = 14; // "dynamic_import"

    println!("{:<path_width$}  {:<relation_width$}  {:>5}  TEXT", "PATH", "RELATION", "LINE");
    println!("{:-<path_width$}  {:-<relation_width$}  {:-<5}  {:-<4}", "", "", "", "");

    for link in links {
        println!(
            "{:<path_width$}  {:<relation_width$}  {:>5}  {}",
            truncate(&link.path, path_width),
            link.relation,
            link.line_number,
            truncate(&link.raw_text, 40),
        );
    }

    println!();
    println!("-- {} {} --", links.len(), direction);
}

/// Print a sync report.
pub fn print_report(report: &SyncReport) {
    println!("Sync complete ({:?}):", report.mode);
    println!("  Files found:    {}", report.files_found);
    println!("  Updated:        {}", report.updated);
    println!("  Deleted:        {}", report.deleted);
    println!("  Unchanged:      {}", report.unchanged);
    println!("  Edges:          {}", report.edges);
    if !report.warnings.is_empty() {
        println!("  Warnings:       {}", report.warnings.len());
        for w in &report.warnings {
            println!("    {} [{:?}] {}", w.path, w.kind, w.message);
        }
    }
    println!("  Duration:       {}ms", report.duration_ms);
}

fn column_width<'a>(values: impl Iterator<Item = &'a str>, min: usize, max: usize) -> usize {
    values.map(|v| v.chars().count()).max().unwrap_or(min).clamp(min, max)
}

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate string with ellipsis if needed.
pub fn truncate(s: &str, max_chars: usize) -> String {
    let count = s.chars().count();
    if count <= max_chars {
        s.to_string()
    } else if max_chars > 3 {
        let head: String = s.chars().take(max_chars - 3).collect();
        format!("{}...", head)
    } else {
        s.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
        assert_eq!(truncate("ñandú ñandú ñandú", 8), "ñandú...");
        assert_eq!(truncate("日本語", 2), "日本");
    }

    #[test]
    fn single_line_collapses_whitespace() {
        assert_eq!(single_line("a\n\n b\tc"), "a b c");
    }
}
