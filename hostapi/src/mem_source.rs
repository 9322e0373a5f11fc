//! In-memory resource source for testing.
//!
//! `MemSource` implements `ResourceSource` using a `BTreeMap` keyed by path.
//! Useful for unit and integration tests where modules and fetched files are
//! built in the test itself; a missing path behaves like an HTTP 404.

use std::collections::BTreeMap;

use crate::error::FetchError;
use crate::traits::ResourceSource;

/// In-memory resource source backed by `BTreeMap`.
#[derive(Debug, Clone, Default)]
pub struct MemSource {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemSource {
    /// Create a new empty source.
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
        }
    }

    /// Create a source pre-populated with files.
    pub fn with_files(files: BTreeMap<String, Vec<u8>>) -> Self {
        Self { files }
    }

    /// Insert a file, replacing any previous contents.
    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.insert(normalize(&path.into()).to_string(), contents.into());
    }

    /// Builder-style [`insert`](MemSource::insert).
    pub fn with(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Remove a file.
    pub fn remove(&mut self, path: &str) {
        self.files.remove(normalize(path));
    }

    /// Returns the number of files in the source.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if the source holds no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Requests may carry a leading `/` (served from the root).
fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

impl ResourceSource for MemSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        self.files
            .get(normalize(path))
            .cloned()
            .ok_or_else(|| FetchError::NotFound(path.to_string()))
    }

    fn contains(&self, path: &str) -> bool {
        self.files.contains_key(normalize(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source() {
        let source = MemSource::new();
        assert!(source.is_empty());
        assert!(matches!(
            source.fetch("missing.wasm"),
            Err(FetchError::NotFound(_))
        ));
        assert!(!source.contains("missing.wasm"));
    }

    #[test]
    fn test_insert_and_fetch() {
        let source = MemSource::new().with("data/level.txt", b"abc".to_vec());
        assert_eq!(source.fetch("data/level.txt").unwrap(), b"abc".to_vec());
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn test_leading_slash_is_root() {
        let source = MemSource::new().with("/engine.wasm", b"x".to_vec());
        assert!(source.contains("engine.wasm"));
        assert_eq!(source.fetch("/engine.wasm").unwrap(), b"x".to_vec());
    }

    #[test]
    fn test_overwrite_and_remove() {
        let mut source = MemSource::new();
        source.insert("a", b"1".to_vec());
        source.insert("a", b"2".to_vec());
        assert_eq!(source.fetch("a").unwrap(), b"2".to_vec());
        source.remove("a");
        assert!(source.is_empty());
    }

    #[test]
    fn test_empty_file() {
        let source = MemSource::new().with("empty.bin", Vec::new());
        assert_eq!(source.fetch("empty.bin").unwrap(), Vec::<u8>::new());
    }
}
