//! Source materialization - bundled resources onto the cache root.

use std::path::{Path, PathBuf};

use crate::builder::freshness::is_newer;
use crate::core::{ShaderSpec, SourceEntry};
use crate::sources::{ExtractionError, Freshness, ResourceStore};

/// What a materialization pass wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Materialized {
    /// Cached files replaced in this pass, in entry order.
    pub extracted: Vec<PathBuf>,
}

impl Materialized {
    /// Whether any file changed, so the artifact must be rebuilt.
    pub fn rebuild_needed(&self) -> bool {
        !self.extracted.is_empty()
    }
}

/// Bring every entry's cached copy up to date.
///
/// Only stale or absent files are extracted; a cache at least as new as the
/// store is left untouched. The first comparison or extraction failure
/// aborts the pass.
pub fn materialize(
    entries: &[SourceEntry],
    store: &dyn ResourceStore,
    cache_root: &Path,
) -> Result<Materialized, ExtractionError> {
    let mut out = Materialized::default();

    for entry in entries {
        let dest = cache_root.join(&entry.relative_path);

        match store.is_newer(&entry.embedded_id, &dest)? {
            Freshness::UpToDate => {
                tracing::trace!("fresh: {}", dest.display());
            }
            Freshness::Stale => {
                tracing::debug!("extracting {} -> {}", entry.embedded_id, dest.display());
                store.extract(&entry.embedded_id, &dest)?;
                out.extracted.push(dest);
            }
        }
    }

    if out.rebuild_needed() {
        tracing::info!(
            "extracted {} of {} files from {} store",
            out.extracted.len(),
            entries.len(),
            store.name()
        );
    }

    Ok(out)
}

/// Restore a pristine copy of `shader` when one of its headers changed.
///
/// An inlined shader has lost its `#include` markers, so a new header can
/// only be spliced into a freshly extracted copy. A header counts as changed
/// when this pass extracted it or it is newer than the cached shader.
pub fn refresh_shader(
    shader: &ShaderSpec,
    entries: &[SourceEntry],
    store: &dyn ResourceStore,
    cache_root: &Path,
    materialized: &mut Materialized,
) -> Result<(), ExtractionError> {
    let dest = cache_root.join(&shader.shader);
    if materialized.extracted.contains(&dest) {
        return Ok(());
    }

    let changed = shader.headers.iter().map(|h| cache_root.join(h)).find(|header| {
        materialized.extracted.contains(header) || is_newer(header, &dest).unwrap_or(true)
    });
    let Some(header) = changed else {
        return Ok(());
    };
    let Some(entry) = entries.iter().find(|e| e.relative_path == shader.shader) else {
        return Ok(());
    };

    tracing::debug!(
        "{} changed, restoring {}",
        header.display(),
        dest.display()
    );
    store.extract(&entry.embedded_id, &dest)?;
    materialized.extracted.push(dest);
    Ok(())
}
