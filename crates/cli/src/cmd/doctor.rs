//! Doctor command: validate configuration and report on the index.

use kbindex_core::config::{ConfigLoader, ResolvedConfig, default_config_path};
use kbindex_core::index::IndexDb;

use super::Context;
use crate::logging;

pub fn run(ctx: &Context) {
    let rc = match &ctx.root {
        Some(root) => ResolvedConfig::for_root(root),
        None => match ConfigLoader::load(ctx.config.as_deref(), ctx.profile.as_deref()) {
            Ok(rc) => rc,
            Err(e) => {
                println!("FAIL kbx doctor");
                println!("{e}");
                if ctx.config.is_none() {
                    println!("looked for: {}", default_config_path().display());
                }
                std::process::exit(1);
            }
        },
    };
    logging::init(&rc);
    tracing::debug!("Resolved profile '{}' at {}", rc.active_profile, rc.root.display());

    println!("OK   kbx doctor");
    match (&ctx.root, &ctx.config) {
        (Some(_), _) => println!("path: (none, --root)"),
        (None, Some(p)) => println!("path: {}", p.display()),
        (None, None) => println!("path: {}", default_config_path().display()),
    }
    println!("profile: {}", rc.active_profile);
    println!("root: {}", rc.root.display());
    println!("index_path: {}", rc.index_path.display());
    println!("extensions: {}", rc.extensions.join(", "));
    println!(
        "graph.depth: default {} / max {}",
        rc.limits.default_depth, rc.limits.max_depth
    );

    if !rc.root.is_dir() {
        println!("WARN root is not a directory");
    }
    print_index_status(&rc);
}

fn print_index_status(rc: &ResolvedConfig) {
    if !rc.index_path.exists() {
        println!("index: missing (run 'kbx sync')");
        return;
    }

    let db = match IndexDb::open_read_only(&rc.index_path) {
        Ok(db) => db,
        Err(e) => {
            println!("index: unreadable ({e})");
            return;
        }
    };

    let counts = db.documents().count_by_kind().and_then(|kinds| {
        let edges = db.graph().count()?;
        Ok((kinds, edges))
    });
    match counts {
        Ok((kinds, edges)) => {
            let total: usize = kinds.iter().map(|(_, n)| n).sum();
            println!("index: {} documents, {} edges", total, edges);
            for (kind, n) in kinds {
                println!("  {:<9} {}", kind.as_str(), n);
            }
        }
        Err(e) => println!("index: unreadable ({e})"),
    }
}
