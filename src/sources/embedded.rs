//! Resources compiled into the executable.

use std::borrow::Cow;
use std::time::SystemTime;

use crate::sources::source::{ExtractionError, ResourceStore};

/// One file baked into the binary with `include_bytes!`.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedFile {
    pub id: &'static str,
    pub contents: &'static [u8],
}

/// Embed a file relative to the crate root under its own path as id.
///
/// ```ignore
/// static FILES: &[EmbeddedFile] = &[embedded_file!("llama.cpp/ggml/include/ggml.h")];
/// ```
#[macro_export]
macro_rules! embedded_file {
    ($path:literal) => {
        $crate::sources::EmbeddedFile {
            id: $path,
            contents: include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/", $path)),
        }
    };
}

/// Resources linked into the running executable.
///
/// Every file shares one timestamp, the executable's own modification time,
/// since that is when the bundled copies last changed.
#[derive(Debug, Clone)]
pub struct EmbeddedResources {
    files: &'static [EmbeddedFile],
    modified: SystemTime,
}

impl EmbeddedResources {
    /// Resources stamped with the running executable's mtime.
    pub fn new(files: &'static [EmbeddedFile]) -> Self {
        let modified = std::env::current_exe()
            .and_then(std::fs::metadata)
            .and_then(|m| m.modified())
            .unwrap_or_else(|e| {
                tracing::debug!("cannot stat current executable ({}), assuming epoch", e);
                SystemTime::UNIX_EPOCH
            });
        EmbeddedResources { files, modified }
    }

    /// Resources stamped with an explicit time.
    pub fn with_modified(files: &'static [EmbeddedFile], modified: SystemTime) -> Self {
        EmbeddedResources { files, modified }
    }

    fn find(&self, id: &str) -> Result<&'static EmbeddedFile, ExtractionError> {
        self.files
            .iter()
            .find(|f| f.id == id)
            .ok_or_else(|| ExtractionError::Missing { id: id.to_string() })
    }
}

impl ResourceStore for EmbeddedResources {
    fn name(&self) -> &str {
        "embedded"
    }

    fn modified(&self, id: &str) -> Result<SystemTime, ExtractionError> {
        self.find(id)?;
        Ok(self.modified)
    }

    fn read(&self, id: &str) -> Result<Cow<'_, [u8]>, ExtractionError> {
        Ok(Cow::Borrowed(self.find(id)?.contents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::Freshness;
    use std::time::Duration;
    use tempfile::TempDir;

    static FILES: &[EmbeddedFile] = &[
        EmbeddedFile {
            id: "toy/a.h",
            contents: b"A;",
        },
        EmbeddedFile {
            id: "toy/b.h",
            contents: b"B;",
        },
    ];

    #[test]
    fn test_extract_and_freshness() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("nested/a.h");
        let store = EmbeddedResources::with_modified(
            FILES,
            SystemTime::now() - Duration::from_secs(3600),
        );

        assert_eq!(store.is_newer("toy/a.h", &dest).unwrap(), Freshness::Stale);
        store.extract("toy/a.h", &dest).unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"A;");
        assert_eq!(store.is_newer("toy/a.h", &dest).unwrap(), Freshness::UpToDate);
    }

    #[test]
    fn test_unknown_id_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = EmbeddedResources::new(FILES);

        let err = store.is_newer("toy/c.h", &tmp.path().join("c.h")).unwrap_err();
        assert!(matches!(err, ExtractionError::Missing { .. }));
    }
}
