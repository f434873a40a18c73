//! Links command: direct references from and to a document.

use kbindex_core::index::{Edge, IndexError};
use serde::Serialize;

use super::output::{LinkOutput, print_json, print_links_table};
use super::{Context, open_for_query, require_document};
use crate::{LinksArgs, OutputFormat};

#[derive(Debug, Serialize)]
struct LinksOutput {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    incoming: Option<Vec<LinkOutput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outgoing: Option<Vec<LinkOutput>>,
}

pub fn run(ctx: &Context, args: LinksArgs) {
    let rc = ctx.load();
    let db = open_for_query(&rc);
    let key = require_document(&db, &rc, &args.path);

    // Both directions are shown by default
    let show_incoming = args.incoming || !args.outgoing;
    let show_outgoing = args.outgoing || !args.incoming;

    let graph = db.graph();
    let incoming = show_incoming
        .then(|| links_or_exit(graph.incoming(&key), "incoming references"))
        .map(|edges| edges.iter().map(LinkOutput::incoming).collect::<Vec<_>>());
    let outgoing = show_outgoing
        .then(|| links_or_exit(graph.outgoing(&key), "outgoing references"))
        .map(|edges| edges.iter().map(LinkOutput::outgoing).collect::<Vec<_>>());

    match args.format.resolve() {
        OutputFormat::Json => print_json(&LinksOutput { path: key, incoming, outgoing }),
        OutputFormat::Quiet => {
            for link in incoming.iter().chain(outgoing.iter()).flatten() {
                println!("{}", link.path);
            }
        }
        OutputFormat::Table => {
            let both = incoming.is_some() && outgoing.is_some();
            if let Some(links) = &incoming {
                if both {
                    println!("=== Incoming (documents referencing {}) ===", key);
                    println!();
                }
                print_links_table(links, "incoming");
            }
            if let Some(links) = &outgoing {
                if both {
                    println!();
                    println!("=== Outgoing (documents {} references) ===", key);
                    println!();
                }
                print_links_table(links, "outgoing");
            }
        }
    }
}

fn links_or_exit(result: Result<Vec<Edge>, IndexError>, what: &str) -> Vec<Edge> {
    match result {
        Ok(edges) => edges,
        Err(e) => {
            eprintln!("Error getting {}: {}", what, e);
            std::process::exit(1);
        }
    }
}
