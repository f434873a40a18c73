//! Recursive corpus directory walker.

use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use walkdir::WalkDir;

/// Directories skipped everywhere in the tree unless the caller overrides them.
pub const DEFAULT_DENYLIST: &[&str] =
    &["node_modules", "target", "dist", "build", "out", "coverage", "__pycache__", "venv"];

/// File extensions considered part of the corpus by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "md", "mdc", "markdown", "mdx", "txt", "yaml", "yml", "json", "toml", "js", "mjs",
    "cjs", "jsx", "ts", "mts", "cts", "tsx",
];

#[derive(Debug, Error)]
pub enum WalkerError {
    #[error("corpus root does not exist: {0}")]
    MissingRoot(String),

    #[error("failed to walk corpus directory {0}: {1}")]
    WalkError(String, #[source] walkdir::Error),
}

/// Information about a discovered corpus file.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    /// Absolute path to the file.
    pub absolute_path: PathBuf,
    /// POSIX path relative to the corpus root (`rules/style.md`).
    pub relative_path: String,
    /// File modification time.
    pub modified: SystemTime,
}

/// An entry the walker could not inspect. The walk itself carries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkIssue {
    /// POSIX path relative to the root, or the absolute path when outside it.
    pub path: String,
    pub message: String,
}

/// Result of walking a corpus.
#[derive(Debug, Default)]
pub struct Walk {
    /// Discovered files, sorted by relative path.
    pub files: Vec<WalkedFile>,
    /// Entries that could not be read (permissions, vanished mid-walk).
    pub issues: Vec<WalkIssue>,
}

/// Which files to enumerate.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Folders to exclude, relative to the root (or absolute inside it).
    pub excluded_folders: Vec<PathBuf>,
    /// Directory names skipped at any depth.
    pub denylist: Vec<String>,
    /// Accepted file extensions, without the dot. Compared case-insensitively.
    pub extensions: Vec<String>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            excluded_folders: Vec::new(),
            denylist: DEFAULT_DENYLIST.iter().map(|s| (*s).to_string()).collect(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Walker for discovering corpus files.
#[derive(Debug)]
pub struct CorpusWalker {
    root: PathBuf,
    options: WalkOptions,
}

impl CorpusWalker {
    /// Create a walker with the default options.
    pub fn new(root: &Path) -> Result<Self, WalkerError> {
        Self::with_options(root, WalkOptions::default())
    }

    /// Create a walker with explicit options.
    ///
    /// Excluded folders can be specified as:
    /// - Relative paths from the root (e.g., "archive/old")
    /// - Absolute paths (will be converted to relative)
    pub fn with_options(root: &Path, options: WalkOptions) -> Result<Self, WalkerError> {
        let root = root
            .canonicalize()
            .map_err(|_| WalkerError::MissingRoot(root.display().to_string()))?;

        if !root.is_dir() {
            return Err(WalkerError::MissingRoot(root.display().to_string()));
        }

        let excluded_folders = options
            .excluded_folders
            .into_iter()
            .map(|p| {
                if p.is_absolute() {
                    p.strip_prefix(&root).unwrap_or(&p).to_path_buf()
                } else {
                    p
                }
            })
            .collect();

        let extensions = options.extensions.into_iter().map(|e| e.to_lowercase()).collect();

        Ok(Self {
            root,
            options: WalkOptions { excluded_folders, extensions, ..options },
        })
    }

    /// Walk the corpus.
    ///
    /// Hidden entries, denylisted directories, configured exclusions and
    /// symbolic links are skipped. Unreadable entries are reported as issues.
    pub fn walk(&self) -> Result<Walk, WalkerError> {
        let mut walk = Walk::default();

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(WalkerError::WalkError(self.root.display().to_string(), e));
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| self.relative(p))
                        .unwrap_or_else(|| self.root.display().to_string());
                    tracing::warn!("Skipping unreadable entry {}: {}", path, e);
                    walk.issues.push(WalkIssue { path, message: e.to_string() });
                    continue;
                }
            };

            // Symlinks are never followed: a linked tree can loop back on itself.
            let file_type = entry.file_type();
            if file_type.is_symlink() || !file_type.is_file() {
                continue;
            }

            let path = entry.path();
            if !self.has_accepted_extension(path) {
                continue;
            }

            let relative_path = self.relative(path);
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    walk.issues.push(WalkIssue { path: relative_path, message: e.to_string() });
                    continue;
                }
            };

            walk.files.push(WalkedFile {
                absolute_path: path.to_path_buf(),
                relative_path,
                modified: metadata.modified().unwrap_or(std::time::UNIX_EPOCH),
            });
        }

        walk.files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(walk)
    }

    /// Check if an entry should be excluded from walking.
    fn is_excluded(&self, entry: &walkdir::DirEntry) -> bool {
        // Never filter the root directory (depth 0)
        if entry.depth() == 0 {
            return false;
        }

        let name = entry.file_name().to_string_lossy();

        if name.starts_with('.') {
            return true;
        }

        if entry.file_type().is_dir()
            && self.options.denylist.iter().any(|d| d.as_str() == name.as_ref())
        {
            return true;
        }

        if !self.options.excluded_folders.is_empty()
            && let Ok(relative) = entry.path().strip_prefix(&self.root)
        {
            for excluded in &self.options.excluded_folders {
                if relative.starts_with(excluded) {
                    return true;
                }
            }
        }

        false
    }

    fn has_accepted_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.options.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
    }

    fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(relative) => to_posix(relative),
            Err(_) => path.display().to_string(),
        }
    }

    /// Get the corpus root path.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Render a relative path with forward slashes, dropping `.` components.
pub fn to_posix(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_corpus() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::write(root.join("note1.md"), "# Note 1").unwrap();
        fs::write(root.join("index.js"), "import './lib.js';").unwrap();

        fs::create_dir_all(root.join("rules")).unwrap();
        fs::write(root.join("rules/style.mdc"), "# Style").unwrap();

        fs::create_dir(root.join(".hidden")).unwrap();
        fs::write(root.join(".hidden/secret.md"), "# Secret").unwrap();

        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "module.exports = 1;").unwrap();

        fs::create_dir_all(root.join("dist")).unwrap();
        fs::write(root.join("dist/bundle.js"), "").unwrap();

        fs::write(root.join("logo.png"), [0u8, 1, 2]).unwrap();

        dir
    }

    fn paths(walk: &Walk) -> Vec<&str> {
        walk.files.iter().map(|f| f.relative_path.as_str()).collect()
    }

    #[test]
    fn test_walk_finds_corpus_files() {
        let corpus = create_test_corpus();
        let walk = CorpusWalker::new(corpus.path()).unwrap().walk().unwrap();

        assert_eq!(paths(&walk), vec!["index.js", "note1.md", "rules/style.mdc"]);
        assert!(walk.issues.is_empty());
    }

    #[test]
    fn test_walk_skips_hidden_and_denylisted() {
        let corpus = create_test_corpus();
        let walk = CorpusWalker::new(corpus.path()).unwrap().walk().unwrap();

        let found = paths(&walk);
        assert!(!found.iter().any(|p| p.contains(".hidden")));
        assert!(!found.iter().any(|p| p.contains("node_modules")));
        assert!(!found.iter().any(|p| p.starts_with("dist/")));
        assert!(!found.iter().any(|p| p.ends_with(".png")));
    }

    #[test]
    fn test_custom_denylist_replaces_default() {
        let corpus = create_test_corpus();
        let options = WalkOptions { denylist: vec!["rules".into()], ..Default::default() };
        let walk = CorpusWalker::with_options(corpus.path(), options).unwrap().walk().unwrap();

        let found = paths(&walk);
        assert!(found.contains(&"dist/bundle.js"));
        assert!(!found.contains(&"rules/style.mdc"));
    }

    #[test]
    fn test_walk_results_sorted() {
        let corpus = create_test_corpus();
        let walk = CorpusWalker::new(corpus.path()).unwrap().walk().unwrap();

        let found = paths(&walk);
        let mut sorted = found.clone();
        sorted.sort();
        assert_eq!(found, sorted);
    }

    #[test]
    fn test_missing_root() {
        let result = CorpusWalker::new(Path::new("/nonexistent/path"));
        assert!(matches!(result.unwrap_err(), WalkerError::MissingRoot(_)));
    }

    #[test]
    fn test_walk_with_nested_exclusion() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("docs/internal")).unwrap();
        fs::write(root.join("docs/readme.md"), "# Docs").unwrap();
        fs::write(root.join("docs/internal/secret.md"), "# Secret").unwrap();
        fs::write(root.join("note.md"), "# Note").unwrap();

        let options = WalkOptions {
            excluded_folders: vec![PathBuf::from("docs/internal")],
            ..Default::default()
        };
        let walk = CorpusWalker::with_options(root, options).unwrap().walk().unwrap();

        assert_eq!(paths(&walk), vec!["docs/readme.md", "note.md"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_skips_symlinks() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("real")).unwrap();
        fs::write(root.join("real/doc.md"), "# Doc").unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("loop")).unwrap();
        std::os::unix::fs::symlink(root.join("real/doc.md"), root.join("alias.md")).unwrap();

        let walk = CorpusWalker::new(root).unwrap().walk().unwrap();
        assert_eq!(paths(&walk), vec!["real/doc.md"]);
    }

    #[test]
    fn test_to_posix() {
        assert_eq!(to_posix(Path::new("a/./b/c.md")), "a/b/c.md");
        assert_eq!(to_posix(Path::new("")), "");
    }
}
