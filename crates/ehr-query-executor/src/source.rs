//! Built-in [`RecordSource`] implementations.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::{ExecutorError, ExecutorResult};
use crate::traits::RecordSource;

/// Reads the dataset from a file on each refresh.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Creates a source for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for FileSource {
    fn read_to_string(&self) -> ExecutorResult<String> {
        std::fs::read_to_string(&self.path).map_err(|source| ExecutorError::SourceRead {
            location: self.describe(),
            source,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Holds dataset text in memory. The text can be swapped at runtime, which
/// takes effect on the next cache refresh.
#[derive(Debug, Default)]
pub struct InMemorySource {
    text: RwLock<String>,
}

impl InMemorySource {
    /// Creates a source holding `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: RwLock::new(text.into()),
        }
    }

    /// Replaces the held text.
    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.write() = text.into();
    }
}

impl RecordSource for InMemorySource {
    fn read_to_string(&self) -> ExecutorResult<String> {
        Ok(self.text.read().clone())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}
