//! Frontmatter serialization back to document text.

use super::types::{Frontmatter, ParsedDocument};

/// Serialize a parsed document back to text.
///
/// Documents with empty frontmatter serialize to their body alone.
pub fn serialize(doc: &ParsedDocument) -> String {
    if doc.frontmatter.is_empty() {
        return doc.body.clone();
    }
    format!("---\n{}---\n\n{}\n", frontmatter_to_yaml(&doc.frontmatter), doc.body)
}

/// Serialize frontmatter to YAML (without delimiters).
pub fn frontmatter_to_yaml(fm: &Frontmatter) -> String {
    serde_yaml::to_string(&fm.fields).unwrap_or_default()
}
