//! ResourceStore trait - common interface for bundled backend sources.

use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;

use crate::util::fs::{make_dirs, modified, parent_dir, write_atomic};

/// Outcome of comparing a resource against its cached copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The cached copy is at least as new as the resource.
    UpToDate,
    /// The cached copy is older than the resource, or missing.
    Stale,
}

/// Error reading a resource or writing it to the cache.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("resource `{id}` is not bundled with this executable")]
    Missing { id: String },

    #[error("failed to read resource `{id}`: {source}")]
    Read {
        id: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to stat {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A store of resources bundled with the running program.
///
/// Implementors provide lookup; freshness comparison and extraction are
/// shared.
pub trait ResourceStore: Send + Sync {
    /// Get the store name for display.
    fn name(&self) -> &str;

    /// Modification time of resource `id`.
    fn modified(&self, id: &str) -> Result<SystemTime, ExtractionError>;

    /// Full contents of resource `id`.
    fn read(&self, id: &str) -> Result<Cow<'_, [u8]>, ExtractionError>;

    /// Compare resource `id` against the cached file at `dest`.
    fn is_newer(&self, id: &str, dest: &Path) -> Result<Freshness, ExtractionError> {
        let source_time = self.modified(id)?;
        let cached_time = modified(dest).map_err(|source| ExtractionError::Stat {
            path: dest.to_path_buf(),
            source,
        })?;

        match cached_time {
            Some(cached) if cached >= source_time => Ok(Freshness::UpToDate),
            _ => Ok(Freshness::Stale),
        }
    }

    /// Write resource `id` to `dest`, replacing any cached copy atomically.
    fn extract(&self, id: &str, dest: &Path) -> Result<(), ExtractionError> {
        let contents = self.read(id)?;

        let dir = parent_dir(dest);
        make_dirs(dir).map_err(|source| ExtractionError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

        write_atomic(dest, &contents).map_err(|source| ExtractionError::Write {
            path: dest.to_path_buf(),
            source,
        })
    }
}
