//! Show command: print one stored document.

use chrono::Local;
use kbindex_core::frontmatter::{Frontmatter, frontmatter_to_yaml};
use kbindex_core::index::{Document, DocumentKind};
use serde::Serialize;

use super::output::print_json;
use super::{Context, open_for_query, require_document};
use crate::ShowArgs;

/// Stored document for JSON output. The body is only present with `--body`.
#[derive(Debug, Serialize)]
struct DocumentOutput<'a> {
    path: &'a str,
    kind: DocumentKind,
    frontmatter: &'a Frontmatter,
    content_hash: &'a str,
    byte_size: u64,
    modified_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
}

impl<'a> DocumentOutput<'a> {
    fn new(doc: &'a Document, with_body: bool) -> Self {
        Self {
            path: &doc.path,
            kind: doc.kind,
            frontmatter: &doc.frontmatter,
            content_hash: &doc.content_hash,
            byte_size: doc.byte_size,
            modified_at: doc.modified_at.to_rfc3339(),
            body: with_body.then_some(doc.body.as_str()),
        }
    }
}

pub fn run(ctx: &Context, args: ShowArgs) {
    let rc = ctx.load();
    let db = open_for_query(&rc);
    let key = require_document(&db, &rc, &args.path);

    let doc = match db.documents().require(&key) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error reading document: {}", e);
            std::process::exit(1);
        }
    };

    if args.json {
        print_json(&DocumentOutput::new(&doc, args.body));
        return;
    }

    println!("path:     {}", doc.path);
    println!("kind:     {}", doc.kind);
    println!("size:     {} bytes", doc.byte_size);
    println!("modified: {}", doc.modified_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
    println!("hash:     {}", doc.content_hash);

    if doc.frontmatter.is_empty() {
        println!("frontmatter: (none)");
    } else {
        println!("frontmatter:");
        for line in frontmatter_to_yaml(&doc.frontmatter).lines() {
            println!("  {}", line);
        }
    }

    if args.body {
        println!();
        println!("{}", doc.body.trim_end());
    }
}
