//! Incremental sync orchestration.
//!
//! A sync runs `Scanning -> Diffing -> Applying -> Done`. Scanning walks the
//! corpus and hashes every file in parallel. Diffing compares those hashes
//! with the stored ones. Applying re-parses only new and changed files,
//! deletes vanished ones and recomputes the edge set, all inside one write
//! transaction.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use super::db::{IndexDb, IndexError};
use super::graph::derive_edges;
use super::types::Document;
use crate::corpus::{
    Classifier, CorpusWalker, Relation, WalkOptions, WalkedFile, WalkerError, content_hash,
    content_hash_bytes, extract_relations,
};
use crate::frontmatter::{self, ParsedDocument};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Corpus walker error: {0}")]
    Walker(#[from] WalkerError),

    #[error("Index database error: {0}")]
    Index(#[from] IndexError),
}

/// Whether unchanged files may be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    Incremental,
    /// Re-parse every file regardless of its stored hash.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Scanning,
    Diffing,
    Applying,
    Done,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scanning => "scanning",
            Self::Diffing => "diffing",
            Self::Applying => "applying",
            Self::Done => "done",
        })
    }
}

/// How a file differs from its stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    Unchanged,
    Changed,
    New,
    /// Stored but no longer on disk.
    Deleted,
}

/// Classify a discovered file against its stored hash.
pub fn classify_change(stored: Option<&str>, current: &str, mode: SyncMode) -> FileChange {
    match stored {
        None => FileChange::New,
        Some(hash) if hash == current && mode == SyncMode::Incremental => FileChange::Unchanged,
        Some(_) => FileChange::Changed,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// The file (or a directory above it) could not be read.
    Read,
    /// The file is not valid UTF-8.
    Decode,
    /// The frontmatter block is malformed; the file was indexed without it.
    Frontmatter,
}

/// A per-file problem that did not abort the sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncWarning {
    pub path: String,
    pub kind: WarningKind,
    pub message: String,
}

/// Summary of a sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    /// Number of files discovered.
    pub files_found: usize,
    /// New and changed documents written.
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// Edges stored after recomputation.
    pub edges: usize,
    pub warnings: Vec<SyncWarning>,
    /// Sync duration in milliseconds.
    pub duration_ms: u64,
}

/// Progress notifications emitted during a sync.
#[derive(Debug, Clone, Copy)]
pub enum Progress<'a> {
    Phase(SyncPhase),
    /// A document was applied. `current` counts from 1.
    Document { current: usize, total: usize, path: &'a str },
}

/// Progress callback for sync operations.
pub type ProgressCallback = Box<dyn Fn(Progress<'_>)>;

/// A file found during scanning, with its current hash.
struct Scanned {
    file: WalkedFile,
    hash: String,
}

/// What Diffing decided to do.
#[derive(Default)]
struct Plan {
    to_parse: Vec<WalkedFile>,
    deleted: Vec<String>,
    unchanged: usize,
}

/// A re-parsed file ready to be written.
struct Parsed {
    document: Document,
    relations: Vec<Relation>,
}

/// Runs syncs of one corpus root into an index.
pub struct SyncEngine {
    root: PathBuf,
    walk_options: WalkOptions,
    classifier: Classifier,
    progress: Option<ProgressCallback>,
}

impl SyncEngine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            walk_options: WalkOptions::default(),
            classifier: Classifier::default(),
            progress: None,
        }
    }

    pub fn with_walk_options(mut self, options: WalkOptions) -> Self {
        self.walk_options = options;
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Re-index only files whose content changed.
    pub fn incremental(&self, db: &mut IndexDb) -> Result<SyncReport, SyncError> {
        self.run(db, SyncMode::Incremental)
    }

    /// Re-index every file.
    pub fn full(&self, db: &mut IndexDb) -> Result<SyncReport, SyncError> {
        self.run(db, SyncMode::Full)
    }

    /// Bring the index in line with the corpus on disk.
    ///
    /// Per-file failures are collected as warnings. Any storage error aborts
    /// the run and leaves the index at its last committed state.
    pub fn run(&self, db: &mut IndexDb, mode: SyncMode) -> Result<SyncReport, SyncError> {
        let start = Instant::now();
        let mut report = SyncReport { mode, ..Default::default() };

        // Scanning
        self.enter(SyncPhase::Scanning);
        let walker = CorpusWalker::with_options(&self.root, self.walk_options.clone())?;
        let walk = walker.walk()?;
        report.files_found = walk.files.len();

        let results: Vec<Result<Scanned, SyncWarning>> =
            walk.files.into_par_iter().map(scan_file).collect();

        let mut scanned = Vec::with_capacity(results.len());
        // Paths that exist but could not be inspected keep their stored record
        let mut unreadable: HashSet<String> = HashSet::new();
        let mut blocked_dirs: Vec<String> = Vec::new();
        for issue in walk.issues {
            blocked_dirs.push(issue.path.clone());
            report.warnings.push(SyncWarning {
                path: issue.path,
                kind: WarningKind::Read,
                message: issue.message,
            });
        }
        for result in results {
            match result {
                Ok(s) => scanned.push(s),
                Err(warning) => {
                    unreadable.insert(warning.path.clone());
                    report.warnings.push(warning);
                }
            }
        }
        tracing::info!(
            "Scanned {} files under {} ({} unreadable)",
            report.files_found,
            self.root.display(),
            unreadable.len() + blocked_dirs.len()
        );

        // Diffing
        self.enter(SyncPhase::Diffing);
        let stored = db.documents().hashes()?;
        let plan = diff(scanned, &stored, &unreadable, &blocked_dirs, mode);
        report.unchanged = plan.unchanged;
        tracing::info!(
            "Diff: {} to parse, {} deleted, {} unchanged",
            plan.to_parse.len(),
            plan.deleted.len(),
            plan.unchanged
        );

        // Applying
        self.enter(SyncPhase::Applying);
        let classifier = &self.classifier;
        let parsed: Vec<(Result<Parsed, SyncWarning>, Option<SyncWarning>)> =
            plan.to_parse.par_iter().map(|file| parse_file(file, classifier)).collect();

        let mut documents = Vec::with_capacity(parsed.len());
        let mut relations = Vec::with_capacity(parsed.len());
        for (result, soft_warning) in parsed {
            report.warnings.extend(soft_warning);
            match result {
                Ok(p) => {
                    relations.push(p.relations);
                    documents.push(p.document);
                }
                Err(warning) => report.warnings.push(warning),
            }
        }

        let tx = db.transaction()?;
        for path in &plan.deleted {
            if tx.documents().delete(path)? {
                report.deleted += 1;
            }
        }

        report.updated = tx.documents().upsert_batch(&documents)?;
        let graph = tx.graph();
        for (i, (doc, rels)) in documents.iter().zip(&relations).enumerate() {
            graph.record_candidates(&doc.path, rels)?;
            tracing::debug!("Applied {} ({} candidates)", doc.path, rels.len());
            self.notify(Progress::Document {
                current: i + 1,
                total: documents.len(),
                path: &doc.path,
            });
        }

        let known: HashSet<String> = tx.documents().hashes()?.into_keys().collect();
        let edges = derive_edges(graph.candidates()?, &known);
        report.edges = graph.replace_all(&edges)?.stored;
        tx.commit()?;

        for warning in &report.warnings {
            tracing::warn!("{} ({:?}): {}", warning.path, warning.kind, warning.message);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        self.enter(SyncPhase::Done);
        tracing::info!(
            "Sync complete: {} updated, {} deleted, {} unchanged, {} edges, {} warnings in {}ms",
            report.updated,
            report.deleted,
            report.unchanged,
            report.edges,
            report.warnings.len(),
            report.duration_ms
        );

        Ok(report)
    }

    fn enter(&self, phase: SyncPhase) {
        tracing::info!("Sync phase: {}", phase);
        self.notify(Progress::Phase(phase));
    }

    fn notify(&self, progress: Progress<'_>) {
        if let Some(ref cb) = self.progress {
            cb(progress);
        }
    }
}

fn scan_file(file: WalkedFile) -> Result<Scanned, SyncWarning> {
    match content_hash(&file.absolute_path) {
        Ok(hash) => Ok(Scanned { file, hash }),
        Err(e) => Err(SyncWarning {
            path: file.relative_path,
            kind: WarningKind::Read,
            message: e.to_string(),
        }),
    }
}

fn diff(
    scanned: Vec<Scanned>,
    stored: &HashMap<String, String>,
    unreadable: &HashSet<String>,
    blocked_dirs: &[String],
    mode: SyncMode,
) -> Plan {
    let mut plan = Plan::default();
    let mut seen: HashSet<&str> = HashSet::with_capacity(scanned.len());

    for s in &scanned {
        seen.insert(s.file.relative_path.as_str());
    }

    for path in stored.keys() {
        let on_disk = seen.contains(path.as_str())
            || unreadable.contains(path)
            || blocked_dirs.iter().any(|dir| is_within(path, dir));
        if !on_disk {
            plan.deleted.push(path.clone());
        }
    }
    plan.deleted.sort();

    for s in scanned {
        match classify_change(stored.get(&s.file.relative_path).map(String::as_str), &s.hash, mode)
        {
            FileChange::Unchanged => plan.unchanged += 1,
            FileChange::Changed | FileChange::New => plan.to_parse.push(s.file),
            FileChange::Deleted => {}
        }
    }

    plan
}

fn is_within(path: &str, dir: &str) -> bool {
    path == dir || path.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
}

/// Read and parse one file.
///
/// The second element is a soft warning for a document that was still
/// indexed (malformed frontmatter).
fn parse_file(
    file: &WalkedFile,
    classifier: &Classifier,
) -> (Result<Parsed, SyncWarning>, Option<SyncWarning>) {
    let path = &file.relative_path;
    let warning = |kind, message: String| SyncWarning { path: path.clone(), kind, message };

    let bytes = match std::fs::read(&file.absolute_path) {
        Ok(bytes) => bytes,
        Err(e) => return (Err(warning(WarningKind::Read, e.to_string())), None),
    };
    // Hash what is stored, in case the file changed since scanning
    let hash = content_hash_bytes(&bytes);
    let byte_size = bytes.len() as u64;

    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => return (Err(warning(WarningKind::Decode, e.to_string())), None),
    };

    let (parsed, soft) = match frontmatter::parse(&text) {
        Ok(parsed) => (parsed, None),
        Err(e) => (
            ParsedDocument::verbatim(&text),
            Some(warning(WarningKind::Frontmatter, e.to_string())),
        ),
    };

    let relations = extract_relations(&text, path);
    let modified_at: DateTime<Utc> = file.modified.into();
    let document = Document {
        path: path.clone(),
        kind: classifier.classify(path),
        frontmatter: parsed.frontmatter,
        body: parsed.body,
        content_hash: hash,
        byte_size,
        modified_at,
    };

    (Ok(Parsed { document, relations }), soft)
}
