//! Deps command: transitive dependencies or dependents of a document.

use kbindex_core::index::IndexError;
use serde::Serialize;

use super::output::{print_json, print_nodes_table};
use super::{Context, open_for_query, require_document};
use crate::{DepsArgs, OutputFormat};

#[derive(Debug, Serialize)]
struct DepsOutput<'a> {
    root: &'a str,
    direction: &'a str,
    depth: u32,
    nodes: &'a [kbindex_core::index::GraphNode],
}

pub fn run(ctx: &Context, args: DepsArgs) {
    let rc = ctx.load();
    let db = open_for_query(&rc);
    let key = require_document(&db, &rc, &args.path);

    let depth = args.depth.unwrap_or(rc.limits.default_depth);
    let graph = db.graph();
    // Ancestors unless dependents were asked for
    let descendants = args.descendants && !args.ancestors;
    let (direction, result) = if descendants {
        ("dependents", graph.descendants(&key, Some(depth)))
    } else {
        ("dependencies", graph.ancestors(&key, Some(depth)))
    };

    let nodes = match result {
        Ok(nodes) => nodes,
        Err(e @ IndexError::DepthOutOfRange { .. }) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Error walking dependency graph: {}", e);
            std::process::exit(1);
        }
    };

    match args.format.resolve() {
        OutputFormat::Table => {
            println!("{} of {} (depth {})", capitalize(direction), key, depth);
            println!();
            print_nodes_table(&nodes, direction);
        }
        OutputFormat::Json => {
            print_json(&DepsOutput { root: &key, direction, depth, nodes: &nodes });
        }
        OutputFormat::Quiet => {
            for node in &nodes {
                println!("{}", node.path);
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
