//! Directory store - bundled resources shipped as a file tree.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::sources::source::{ExtractionError, ResourceStore};

/// Resources laid out on disk, one file per id under `root`.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryResources { root: root.into() }
    }

    /// The root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn map_err(&self, id: &str, source: io::Error) -> ExtractionError {
        if source.kind() == io::ErrorKind::NotFound {
            ExtractionError::Missing { id: id.to_string() }
        } else {
            ExtractionError::Read {
                id: id.to_string(),
                source,
            }
        }
    }
}

impl ResourceStore for DirectoryResources {
    fn name(&self) -> &str {
        "directory"
    }

    fn modified(&self, id: &str) -> Result<SystemTime, ExtractionError> {
        fs::metadata(self.path_of(id))
            .and_then(|m| m.modified())
            .map_err(|e| self.map_err(id, e))
    }

    fn read(&self, id: &str) -> Result<Cow<'_, [u8]>, ExtractionError> {
        fs::read(self.path_of(id))
            .map(Cow::Owned)
            .map_err(|e| self.map_err(id, e))
    }
}
