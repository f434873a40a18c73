//! Sync command implementation.

use std::io::Write;

use kbindex_core::index::{Progress, ProgressCallback, SyncMode, SyncPhase};

use super::Context;
use super::output::{print_json, print_report};
use crate::SyncArgs;
use crate::logging;

pub fn run(ctx: &Context, args: SyncArgs) {
    let rc = ctx.load();

    if !rc.root.is_dir() {
        eprintln!("Corpus root is not a directory: {}", rc.root.display());
        std::process::exit(1);
    }

    let mut db = match rc.open_index() {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error opening index database: {}", e);
            std::process::exit(1);
        }
    };

    let mode = if args.full { SyncMode::Full } else { SyncMode::Incremental };
    let mut engine = rc.sync_engine();

    if !args.json {
        println!("Syncing corpus: {}", rc.root.display());
        engine = engine.with_progress(progress_printer(args.verbose));
    }

    let report = match engine.run(&mut db, mode) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("\nError during sync: {}", e);
            logging::flush();
            std::process::exit(1);
        }
    };

    if args.json {
        print_json(&report);
    } else {
        println!();
        print_report(&report);
        println!();
        println!("Index stored at: {}", rc.index_path.display());
    }
}

fn progress_printer(verbose: bool) -> ProgressCallback {
    if verbose {
        Box::new(|event: Progress<'_>| match event {
            Progress::Phase(phase) => println!("== {} ==", phase),
            Progress::Document { current, total, path } => {
                println!("[{}/{}] {}", current, total, path);
            }
        })
    } else {
        Box::new(|event: Progress<'_>| match event {
            Progress::Phase(SyncPhase::Done) => println!(),
            Progress::Phase(_) => {}
            Progress::Document { current, total, .. } => {
                if current % 50 == 0 || current == total {
                    print!("\rIndexing... {}/{}", current, total);
                    std::io::stdout().flush().ok();
                }
            }
        })
    }
}
