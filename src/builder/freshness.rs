//! Build cache gate.
//!
//! Decides whether a previously built artifact can be reused by comparing
//! modification times of the artifact and the files it was built from.

use std::io;
use std::path::Path;

use crate::util::fs::modified;

/// Whether `path` was modified after `than`.
///
/// A missing `path` is never newer; a missing `than` is older than
/// anything that exists.
pub fn is_newer(path: &Path, than: &Path) -> io::Result<bool> {
    let Some(path_time) = modified(path)? else {
        return Ok(false);
    };
    match modified(than)? {
        Some(than_time) => Ok(path_time > than_time),
        None => Ok(true),
    }
}

/// Whether the artifact at `artifact` must be (re)built.
///
/// True when forced, when the artifact is absent, or when any watched path
/// is newer than it. A watched path that cannot be stat'ed forces a build.
pub fn needs_build(artifact: &Path, watched: &[impl AsRef<Path>], force: bool) -> bool {
    if force {
        tracing::debug!("rebuild forced");
        return true;
    }

    match modified(artifact) {
        Ok(Some(_)) => {}
        Ok(None) => {
            tracing::debug!("artifact {} is absent", artifact.display());
            return true;
        }
        Err(e) => {
            tracing::debug!("cannot stat {}: {}", artifact.display(), e);
            return true;
        }
    }

    for path in watched {
        let path = path.as_ref();
        match is_newer(path, artifact) {
            Ok(true) => {
                tracing::debug!("{} is newer than the artifact", path.display());
                return true;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::debug!("cannot stat {}: {}", path.display(), e);
                return true;
            }
        }
    }

    false
}
