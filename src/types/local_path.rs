// ABOUTME: Validated path on the local filesystem.
// ABOUTME: Source of uploads and destination of downloads.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocalPathError {
    #[error("local path cannot be empty")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalPath(PathBuf);

impl LocalPath {
    pub fn new(value: &str) -> Result<Self, LocalPathError> {
        if value.is_empty() {
            return Err(LocalPathError::Empty);
        }
        Ok(Self(PathBuf::from(value)))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for LocalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
