//! Search command implementation.

use kbindex_core::index::{IndexError, MatchMode, SearchQuery};

use super::output::{print_hits_table, print_json};
use super::{Context, open_for_query};
use crate::{OutputFormat, SearchArgs};

pub fn run(ctx: &Context, args: SearchArgs) {
    let rc = ctx.load();
    let db = open_for_query(&rc);

    let query = SearchQuery {
        text: args.terms.join(" "),
        mode: if args.any { MatchMode::Any } else { MatchMode::All },
        kind: args.kind,
        limit: Some(args.limit.unwrap_or(rc.search_limit)),
    };
    tracing::debug!("Search query: {:?}", query);

    let hits = match db.fulltext().search(&query) {
        Ok(hits) => hits,
        Err(IndexError::InvalidQuery(msg)) => {
            eprintln!("Invalid search: {}", msg);
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Error searching index: {}", e);
            std::process::exit(1);
        }
    };

    match args.format.resolve() {
        OutputFormat::Table => print_hits_table(&hits),
        OutputFormat::Json => print_json(&hits),
        OutputFormat::Quiet => {
            for hit in &hits {
                println!("{}", hit.path);
            }
        }
    }
}
