use crate::error::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A Salesforce source file read into memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredFile {
    /// Path relative to the scan root, with `/` separators
    pub path: String,

    /// Full text content
    pub content: String,

    /// Size in bytes
    pub size_bytes: u64,

    /// Number of lines
    pub line_count: usize,
}

impl DiscoveredFile {
    /// Creates a file record from already loaded content.
    #[must_use]
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            path: path.into(),
            size_bytes: content.len() as u64,
            line_count: content.lines().count(),
            content,
        }
    }

    /// Reads a file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUtf8`] if the file is not valid UTF-8 and
    /// [`Error::Io`] for any other read failure.
    pub fn read(absolute_path: &Path, relative_path: impl Into<String>) -> Result<Self> {
        let content = std::fs::read_to_string(absolute_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidData {
                Error::invalid_utf8(absolute_path)
            } else {
                Error::io(absolute_path, e)
            }
        })?;

        Ok(Self::new(relative_path, content))
    }

    /// Returns the file name component of the path.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Returns the path as a [`PathBuf`].
    #[must_use]
    pub fn path_buf(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }
}
