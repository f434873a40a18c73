//! Frontmatter parsing and serialization.
//!
//! This module provides functionality to:
//! - Split a document into a YAML preamble and its body, strictly or softly
//! - Sanitize the parsed preamble
//! - Serialize documents back to text with frontmatter

pub mod parser;
pub mod serializer;
pub mod types;

pub use parser::{FrontmatterParseError, extract, parse};
pub use serializer::{frontmatter_to_yaml, serialize};
pub use types::{Frontmatter, ParsedDocument, RESERVED_KEYS};
