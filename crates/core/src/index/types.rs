//! Index data types for documents, edges and queries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::frontmatter::Frontmatter;

/// Document classification derived from its corpus path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    /// Standing instructions for the agent.
    Rule,
    /// Invocable command definitions.
    Command,
    /// Packaged capabilities (`SKILL.md` and friends).
    Skill,
    /// Work items.
    Task,
    /// Story maps grouping tasks.
    StoryMap,
    /// Anything else.
    #[default]
    Other,
}

impl DocumentKind {
    pub const ALL: [Self; 6] =
        [Self::Rule, Self::Command, Self::Skill, Self::Task, Self::StoryMap, Self::Other];

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Command => "command",
            Self::Skill => "skill",
            Self::Task => "task",
            Self::StoryMap => "story-map",
            Self::Other => "other",
        }
    }
}

impl FromStr for DocumentKind {
    type Err = UnknownVariant;

    /// Parse a kind (case-insensitive, `_` and `-` interchangeable).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "rule" => Ok(Self::Rule),
            "command" => Ok(Self::Command),
            "skill" => Ok(Self::Skill),
            "task" => Ok(Self::Task),
            "story-map" | "storymap" => Ok(Self::StoryMap),
            "other" => Ok(Self::Other),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of reference from one document to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// `import x from './x.js'`, `export * from './x.js'`
    StaticImport,
    /// `import('./x.js')`
    DynamicImport,
    /// `require('./x.js')`
    RequireStyle,
    /// `[text](./doc.md)` or `[id]: ./doc.md`
    Reference,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StaticImport => "static_import",
            Self::DynamicImport => "dynamic_import",
            Self::RequireStyle => "require_style",
            Self::Reference => "reference",
        }
    }
}

impl FromStr for RelationKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static_import" => Ok(Self::StaticImport),
            "dynamic_import" => Ok(Self::DynamicImport),
            "require_style" => Ok(Self::RequireStyle),
            "reference" => Ok(Self::Reference),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A string that names no variant of the enum it was parsed as.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant: {0}")]
pub struct UnknownVariant(pub String);

/// One indexed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// POSIX path relative to the corpus root. Unique.
    pub path: String,
    pub kind: DocumentKind,
    pub frontmatter: Frontmatter,
    /// Body text after the frontmatter block.
    pub body: String,
    /// Digest of the raw file bytes.
    pub content_hash: String,
    pub byte_size: u64,
    pub modified_at: DateTime<Utc>,
}

/// A validated, stored reference between two indexed documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// The referencing document.
    pub source_path: String,
    /// The referenced document.
    pub target_path: String,
    pub relation: RelationKind,
    /// 1-based line of the reference in the source document.
    pub line_number: u32,
    /// The reference as written.
    pub raw_text: String,
}

/// A node reached by a graph traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub path: String,
    /// Minimum number of edge hops from the traversal root.
    pub depth: u32,
}

/// Depth bounds applied to graph traversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalLimits {
    /// Depth used when the caller does not ask for one.
    pub default_depth: u32,
    /// Largest depth a caller may ask for.
    pub max_depth: u32,
}

impl Default for TraversalLimits {
    fn default() -> Self {
        Self { default_depth: 3, max_depth: 10 }
    }
}

/// How multiple search terms combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Every term must occur.
    #[default]
    All,
    /// Any term may occur.
    Any,
}

/// Full-text query parameters.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Free text. Words are stemmed; a trailing `*` makes a word a prefix.
    pub text: String,
    pub mode: MatchMode,
    /// Restrict hits to one document kind.
    pub kind: Option<DocumentKind>,
    /// Maximum results to return.
    pub limit: Option<u32>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Default::default() }
    }
}

/// A ranked full-text hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub path: String,
    pub kind: DocumentKind,
    /// Relevance score (higher = more relevant).
    pub score: f64,
    /// Matching excerpt with terms wrapped in `[` `]`.
    pub snippet: String,
}
