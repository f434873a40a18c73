pub mod deps;
pub mod doctor;
pub mod links;
pub mod output;
pub mod search;
pub mod show;
pub mod sync;

use std::path::PathBuf;

use kbindex_core::config::{ConfigLoader, ResolvedConfig};
use kbindex_core::index::IndexDb;

use crate::logging;

/// Global flags shared by every command.
#[derive(Debug)]
pub struct Context {
    pub config: Option<PathBuf>,
    pub profile: Option<String>,
    pub root: Option<PathBuf>,
}

impl Context {
    /// Resolve configuration, exiting on failure, and start logging.
    pub fn load(&self) -> ResolvedConfig {
        let rc = match &self.root {
            Some(root) => ResolvedConfig::for_root(root),
            None => match ConfigLoader::load(self.config.as_deref(), self.profile.as_deref()) {
                Ok(rc) => rc,
                Err(e) => {
                    eprintln!("Error loading config: {}", e);
                    eprintln!("Hint: pass --root <dir> to index a directory without a config file.");
                    std::process::exit(1);
                }
            },
        };
        logging::init(&rc);
        rc
    }
}

/// Open the index for queries, exiting with a hint when it does not exist yet.
pub fn open_for_query(rc: &ResolvedConfig) -> IndexDb {
    if !rc.index_path.exists() {
        eprintln!("No index at {}", rc.index_path.display());
        eprintln!("Hint: Run 'kbx sync' to build the index first.");
        std::process::exit(1);
    }
    match rc.open_index_read_only() {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error opening index: {}", e);
            eprintln!("Hint: Run 'kbx sync' to rebuild the index.");
            std::process::exit(1);
        }
    }
}

/// Look up a document key, exiting when the document is not indexed.
pub fn require_document(db: &IndexDb, rc: &ResolvedConfig, input: &str) -> String {
    let key = rc.document_key(input);
    match db.documents().get(&key) {
        Ok(Some(_)) => key,
        Ok(None) => {
            eprintln!("Document not found in index: {}", key);
            eprintln!("Hint: Check the path or run 'kbx sync'.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error looking up document: {}", e);
            std::process::exit(1);
        }
    }
}
