//! Content hashing for change detection.

use std::fs;
use std::io::Result;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Width of every digest produced by this module, in hex characters.
pub const HASH_WIDTH: usize = 64;

/// Compute the digest of raw bytes.
///
/// SHA-256, hex-encoded. The value only signals "content changed"; it is not
/// used for anything security related.
pub fn content_hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Compute the digest of a file's raw bytes.
pub fn content_hash(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(content_hash_bytes(&bytes))
}

/// Compute hash from content string (for testing).
pub fn content_hash_str(content: &str) -> String {
    content_hash_bytes(content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_content_hash_str_consistent() {
        let content = "# Hello\n\nThis is a test.";
        assert_eq!(content_hash_str(content), content_hash_str(content));
    }

    #[test]
    fn test_content_hash_str_different_content() {
        assert_ne!(content_hash_str("# Hello"), content_hash_str("# World"));
    }

    #[test]
    fn test_line_endings_are_significant() {
        assert_ne!(content_hash_str("a\nb"), content_hash_str("a\r\nb"));
        assert_ne!(content_hash_str("a\n"), content_hash_str("a"));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            content_hash_str(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_content_hash_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.md");
        fs::write(&path, "# Test\n\nContent here.").unwrap();

        let hash = content_hash(&path).unwrap();
        assert_eq!(hash.len(), HASH_WIDTH);
    }

    #[test]
    fn test_content_hash_file_matches_str() {
        let content = "# Test\n\nContent here.\n";
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.md");
        fs::write(&path, content).unwrap();

        assert_eq!(content_hash(&path).unwrap(), content_hash_str(content));
    }
}
