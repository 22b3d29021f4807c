//! Temp buffer naming

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Default extension for relayed transport streams
pub const DEFAULT_EXTENSION: &str = "ts";

/// Where a relay instance keeps its buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferLocation {
    /// Unique id, also the file stem
    pub id: String,
    /// Full path of the temp file
    pub path: PathBuf,
}

/// Supplies a unique temp file location per relay instance
pub trait TempPathBuilder: Send + Sync {
    fn build(&self) -> BufferLocation;
}

/// Names buffers `<root>/<uuid>.<extension>`
#[derive(Debug, Clone)]
pub struct TempDirPaths {
    root: PathBuf,
    extension: String,
}

impl TempDirPaths {
    /// Create a builder rooted at `root` using the default extension
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Set the file extension (without the leading dot)
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Root directory of all buffers
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for TempDirPaths {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("tuner-relay"))
    }
}

impl TempPathBuilder for TempDirPaths {
    fn build(&self) -> BufferLocation {
        let id = Uuid::new_v4().simple().to_string();
        let path = self.root.join(format!("{}.{}", id, self.extension));
        BufferLocation { id, path }
    }
}
