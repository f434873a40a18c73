//! Frontmatter types and data structures.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys removed from every parsed map, at any depth. They would otherwise
/// alias object internals in consumers that treat frontmatter as a plain
/// object.
pub const RESERVED_KEYS: &[&str] = &["__proto__", "prototype", "constructor"];

/// Parsed frontmatter of a document. Empty when the document has none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frontmatter {
    /// Fields as key-value pairs, ordered by key.
    pub fields: Map<String, Value>,
}

impl Frontmatter {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Convenience accessor for string-valued fields.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Result of splitting frontmatter from a document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    /// Parsed frontmatter (empty if absent).
    pub frontmatter: Frontmatter,
    /// The document body (everything after the frontmatter block).
    pub body: String,
}

impl ParsedDocument {
    /// The document taken as-is: no frontmatter, the original text as body.
    pub fn verbatim(content: &str) -> Self {
        Self { frontmatter: Frontmatter::default(), body: content.to_string() }
    }
}
