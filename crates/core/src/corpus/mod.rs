//! Corpus file discovery, classification and content inspection.
//!
//! This module provides utilities for walking a corpus directory,
//! classifying documents by path, computing content hashes and extracting
//! local references from document text.

pub mod classifier;
pub mod extractor;
pub mod hasher;
pub mod walker;

pub use classifier::{Classifier, ClassifyRule, PathMatcher, default_rules};
pub use extractor::{Relation, RelationScan, Relations, Syntax, extract_relations, resolve_relative};
pub use hasher::{HASH_WIDTH, content_hash, content_hash_bytes, content_hash_str};
pub use walker::{
    CorpusWalker, DEFAULT_DENYLIST, DEFAULT_EXTENSIONS, Walk, WalkIssue, WalkOptions, WalkedFile,
    WalkerError, to_posix,
};
