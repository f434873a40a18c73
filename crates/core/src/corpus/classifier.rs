//! Path-based document classification.

use serde::{Deserialize, Serialize};

use crate::index::types::DocumentKind;

/// What part of a path a rule looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathMatcher {
    /// Any directory segment equals the value (case-insensitive).
    Segment(String),
    /// The file name equals the value (case-insensitive).
    FileName(String),
}

impl PathMatcher {
    fn matches(&self, dirs: &[&str], file_name: &str) -> bool {
        match self {
            Self::Segment(s) => dirs.iter().any(|d| d.eq_ignore_ascii_case(s)),
            Self::FileName(f) => file_name.eq_ignore_ascii_case(f),
        }
    }
}

/// A single classification rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyRule {
    pub matcher: PathMatcher,
    pub kind: DocumentKind,
}

impl ClassifyRule {
    pub fn segment(segment: &str, kind: DocumentKind) -> Self {
        Self { matcher: PathMatcher::Segment(segment.to_string()), kind }
    }

    pub fn file_name(name: &str, kind: DocumentKind) -> Self {
        Self { matcher: PathMatcher::FileName(name.to_string()), kind }
    }
}

/// Ordered rule list. The first matching rule decides the kind.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassifyRule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl Classifier {
    pub fn new(rules: Vec<ClassifyRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ClassifyRule] {
        &self.rules
    }

    /// Classify a corpus-relative path. Backslashes are treated as separators.
    pub fn classify(&self, path: &str) -> DocumentKind {
        let normalized = path.replace('\\', "/");
        let segments: Vec<&str> =
            normalized.split('/').filter(|s| !s.is_empty() && *s != ".").collect();

        let Some((file_name, dirs)) = segments.split_last() else {
            return DocumentKind::Other;
        };

        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(dirs, file_name))
            .map_or(DocumentKind::Other, |rule| rule.kind)
    }
}

/// Built-in rules, in priority order.
pub fn default_rules() -> Vec<ClassifyRule> {
    vec![
        ClassifyRule::segment("story-maps", DocumentKind::StoryMap),
        ClassifyRule::segment("story-map", DocumentKind::StoryMap),
        ClassifyRule::file_name("SKILL.md", DocumentKind::Skill),
        ClassifyRule::segment("skills", DocumentKind::Skill),
        ClassifyRule::segment("commands", DocumentKind::Command),
        ClassifyRule::segment("rules", DocumentKind::Rule),
        ClassifyRule::segment("tasks", DocumentKind::Task),
    ]
}
