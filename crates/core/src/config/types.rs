use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::corpus::{
    Classifier, ClassifyRule, DEFAULT_DENYLIST, DEFAULT_EXTENSIONS, WalkOptions, default_rules,
    to_posix,
};
use crate::index::{IndexDb, IndexError, SyncEngine, TraversalLimits};

/// Index location used when a profile does not set one.
pub const DEFAULT_INDEX_PATH: &str = "{{root}}/.kbindex/index.db";

#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    pub version: u32,
    pub profile: Option<String>,
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
    #[serde(default)]
    pub walker: WalkerConfig,
    /// Replaces the built-in classification rules when present.
    #[serde(default)]
    pub classify: Option<Vec<ClassifyRuleConfig>>,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct Profile {
    pub root: String,
    pub index_path: Option<String>,
    /// Folders to skip while walking (relative to root).
    #[serde(default)]
    pub excluded_folders: Vec<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct WalkerConfig {
    /// File extensions to index, without the dot.
    pub extensions: Option<Vec<String>>,
    /// Directory names never descended into. Replaces the default list.
    pub denylist: Option<Vec<String>>,
}

/// One `[[classify]]` entry: exactly one of `segment` or `file_name`.
#[derive(Debug, Deserialize, Clone)]
pub struct ClassifyRuleConfig {
    pub segment: Option<String>,
    pub file_name: Option<String>,
    pub kind: String,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct GraphConfig {
    #[serde(default = "default_depth")]
    pub default_depth: u32,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self { default_depth: default_depth(), max_depth: default_max_depth() }
    }
}

fn default_depth() -> u32 {
    TraversalLimits::default().default_depth
}

fn default_max_depth() -> u32 {
    TraversalLimits::default().max_depth
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SearchConfig {
    #[serde(default = "default_search_limit")]
    pub default_limit: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_limit: default_search_limit() }
    }
}

fn default_search_limit() -> u32 {
    20
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file_level: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), file_level: None, file: None }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Fully resolved settings for one corpus.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub active_profile: String,
    pub root: PathBuf,
    pub index_path: PathBuf,
    /// Folders to skip while walking (relative to root).
    pub excluded_folders: Vec<PathBuf>,
    pub extensions: Vec<String>,
    pub denylist: Vec<String>,
    pub classify_rules: Vec<ClassifyRule>,
    pub limits: TraversalLimits,
    pub search_limit: u32,
    pub logging: LoggingConfig,
}

impl ResolvedConfig {
    /// Defaults for a corpus root, without reading any config file.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let index_path = root.join(".kbindex").join("index.db");
        Self {
            active_profile: "default".to_string(),
            root,
            index_path,
            excluded_folders: Vec::new(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            classify_rules: default_rules(),
            limits: TraversalLimits::default(),
            search_limit: default_search_limit(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            excluded_folders: self.excluded_folders.clone(),
            denylist: self.denylist.clone(),
            extensions: self.extensions.clone(),
        }
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.classify_rules.clone())
    }

    /// Open (or create) the index database with the configured limits.
    pub fn open_index(&self) -> Result<IndexDb, IndexError> {
        Ok(IndexDb::open(&self.index_path)?.with_limits(self.limits))
    }

    /// Open the index database for queries only.
    pub fn open_index_read_only(&self) -> Result<IndexDb, IndexError> {
        Ok(IndexDb::open_read_only(&self.index_path)?.with_limits(self.limits))
    }

    /// A sync engine for this corpus.
    pub fn sync_engine(&self) -> SyncEngine {
        SyncEngine::new(&self.root)
            .with_walk_options(self.walk_options())
            .with_classifier(self.classifier())
    }

    /// Turn a user-supplied path into the corpus-relative key documents use.
    ///
    /// Absolute paths under the root are made relative; `./` prefixes and
    /// backslashes are normalised.
    pub fn document_key(&self, input: &str) -> String {
        let path = Path::new(input);
        let relative = match path.strip_prefix(&self.root) {
            Ok(rel) if path.is_absolute() => to_posix(rel),
            _ => input.replace('\\', "/"),
        };
        let mut key = relative.as_str();
        while let Some(rest) = key.strip_prefix("./") {
            key = rest;
        }
        key.to_string()
    }
}
