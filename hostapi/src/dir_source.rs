//! Filesystem-backed resource source.
//!
//! `DirSource` serves files relative to a root directory, the native
//! counterpart of fetching paths from the page's serving root. Absolute
//! paths and parent components are refused so a guest can never read
//! outside the root.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::FetchError;
use crate::traits::ResourceSource;

/// Resource source reading files beneath `root`.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path onto the filesystem.
    fn resolve(&self, path: &str) -> Result<PathBuf, FetchError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return Err(FetchError::InvalidPath(path.to_string()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(FetchError::InvalidPath(path.to_string())),
            }
        }
        Ok(self.root.join(relative))
    }
}

impl ResourceSource for DirSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let full = self.resolve(path)?;
        log::debug!("fetching {} from {}", path, full.display());
        fs::read(&full).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FetchError::NotFound(path.to_string()),
            _ => FetchError::Io {
                path: path.to_string(),
                source: e,
            },
        })
    }

    fn contains(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }
}
