//! Frontmatter parsing from corpus documents.

use serde_json::Value;
use thiserror::Error;

use super::types::{Frontmatter, ParsedDocument, RESERVED_KEYS};

/// Errors that can occur during strict frontmatter parsing.
#[derive(Debug, Error)]
pub enum FrontmatterParseError {
    #[error("frontmatter block is not terminated by a closing `---` line")]
    Unterminated,

    #[error("invalid YAML frontmatter: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("frontmatter must be a mapping of keys to values")]
    NotAMapping,
}

/// Parse frontmatter from document content.
///
/// Frontmatter is delimited by `---` lines at the start of the document:
/// ```markdown
/// ---
/// key: value
/// ---
/// # Document content
/// ```
///
/// Documents without an opening delimiter parse to empty frontmatter. The
/// body is trimmed. Reserved keys are stripped at every depth.
pub fn parse(content: &str) -> Result<ParsedDocument, FrontmatterParseError> {
    let text = content.strip_prefix('\u{feff}').unwrap_or(content);

    let Some(after_open) = strip_opening_delimiter(text) else {
        return Ok(ParsedDocument {
            frontmatter: Frontmatter::default(),
            body: content.trim().to_string(),
        });
    };

    let (yaml_content, body) =
        split_at_closing_delimiter(after_open).ok_or(FrontmatterParseError::Unterminated)?;

    let frontmatter = if yaml_content.trim().is_empty() {
        Frontmatter::default()
    } else {
        match serde_yaml::from_str::<Value>(yaml_content)? {
            Value::Null => Frontmatter::default(),
            Value::Object(mut fields) => {
                strip_reserved(&mut fields);
                Frontmatter { fields }
            }
            _ => return Err(FrontmatterParseError::NotAMapping),
        }
    };

    Ok(ParsedDocument { frontmatter, body: body.trim().to_string() })
}

/// Split a document without ever failing.
///
/// Any parse failure yields empty frontmatter and the original text,
/// untouched, as the body.
pub fn extract(content: &str) -> ParsedDocument {
    parse(content).unwrap_or_else(|_| ParsedDocument::verbatim(content))
}

/// Returns the text after the opening `---` line, if there is one.
fn strip_opening_delimiter(text: &str) -> Option<&str> {
    let (first_line, rest) = match text.find('\n') {
        Some(i) => (&text[..i], &text[i + 1..]),
        None => (text, ""),
    };
    (first_line.trim_end() == "---").then_some(rest)
}

/// Find the closing `---` line; returns (yaml, body).
fn split_at_closing_delimiter(text: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&text[..offset], &text[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn strip_reserved(fields: &mut serde_json::Map<String, Value>) {
    for key in RESERVED_KEYS {
        fields.remove(*key);
    }
    for value in fields.values_mut() {
        strip_reserved_value(value);
    }
}

fn strip_reserved_value(value: &mut Value) {
    match value {
        Value::Object(map) => strip_reserved(map),
        Value::Array(items) => items.iter_mut().for_each(strip_reserved_value),
        _ => {}
    }
}
