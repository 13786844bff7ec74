//! Static description of a runtime-built backend.
//!
//! A [`BackendSpec`] says everything the provisioning pipeline needs to know
//! about one backend: which embedded files to materialize, which shader (if
//! any) needs its headers inlined, how to compile the shared library, and
//! which entry points the built library must export.

use std::path::{Path, PathBuf};

use crate::core::platform::PlatformSignature;
use crate::core::policy::BackendId;
use crate::util::hash::Fingerprint;

/// Maps a resource bundled with the executable to a path under the cache root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Identifier of the embedded resource
    pub embedded_id: String,
    /// Destination relative to the cache root
    pub relative_path: PathBuf,
}

impl SourceEntry {
    pub fn new(embedded_id: impl Into<String>, relative_path: impl Into<PathBuf>) -> Self {
        SourceEntry {
            embedded_id: embedded_id.into(),
            relative_path: relative_path.into(),
        }
    }
}

/// A shader whose `#include` lines must be inlined before the build.
///
/// Needed when the shader compiler runs at load time without include paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSpec {
    /// Shader source, relative to the cache root
    pub shader: PathBuf,
    /// Headers to inline, relative to the cache root
    pub headers: Vec<PathBuf>,
}

/// The fixed, versioned compiler invocation for a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRecipe {
    /// Translation units, relative to the cache root
    pub sources: Vec<PathBuf>,
    /// Optimization level passed as `-O<n>`
    pub opt_level: u8,
    /// Link with `-pthread`
    pub pthread: bool,
    /// Preprocessor defines (name, optional value)
    pub defines: Vec<(String, Option<String>)>,
    /// Pass `-w`
    pub suppress_warnings: bool,
    /// Apple frameworks to link
    pub frameworks: Vec<String>,
    /// Libraries to link (without -l prefix)
    pub libs: Vec<String>,
}

impl BuildRecipe {
    /// A recipe compiling `sources` with `-O3` and nothing else.
    pub fn new(sources: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        BuildRecipe {
            sources: sources.into_iter().map(Into::into).collect(),
            opt_level: 3,
            pthread: false,
            defines: Vec::new(),
            suppress_warnings: false,
            frameworks: Vec::new(),
            libs: Vec::new(),
        }
    }

    /// Short hash of every input that shapes the built library.
    pub fn fingerprint(&self, variant: &BuildVariant) -> String {
        let mut fp = Fingerprint::new();
        for src in &self.sources {
            fp.update_str(&src.to_string_lossy());
        }
        fp.update_str(&format!("-O{}", self.opt_level));
        fp.update_str(if self.pthread { "pthread" } else { "" });
        for (name, value) in &self.defines {
            fp.update_str(name);
            fp.update_str(value.as_deref().unwrap_or(""));
        }
        fp.update_str(if self.suppress_warnings { "-w" } else { "" });
        fp.update_strs(self.frameworks.iter().map(String::as_str));
        fp.update_strs(self.libs.iter().map(String::as_str));
        fp.update_str(
            &variant
                .compiler
                .as_deref()
                .map(|cc| cc.to_string_lossy())
                .unwrap_or_default(),
        );
        fp.update_strs(variant.cflags.iter().map(String::as_str));
        fp.finish_short()
    }
}

/// Build inputs chosen on the host rather than by the recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildVariant {
    /// Resolved compiler, when one was found
    pub compiler: Option<PathBuf>,
    /// User flags appended to the recipe's
    pub cflags: Vec<String>,
}

/// Exported symbol names of the backend's entry points.
///
/// Each role has a fixed native signature, see [`crate::loader::BackendApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoints {
    /// `backend_t init(void)`
    pub init: String,
    /// `bool is_backend(backend_t)`
    pub is_backend: String,
    /// `backend_reg_t reg(void)`
    pub registration: String,
    /// `void log_set(log_callback, void *)`, optional
    pub log_set: Option<String>,
}

/// Everything needed to provision one backend.
#[derive(Debug, Clone)]
pub struct BackendSpec {
    /// Which backend this is
    pub id: BackendId,
    /// Stem of the built artifact (e.g. "ggml-metal")
    pub name: String,
    /// Platforms the backend can run on
    pub platform: PlatformSignature,
    /// Files to materialize, in extraction order
    pub sources: Vec<SourceEntry>,
    /// Shader needing header inlining
    pub shader: Option<ShaderSpec>,
    /// How to compile the artifact
    pub recipe: BuildRecipe,
    /// Entry points the artifact must export
    pub entry_points: EntryPoints,
}

impl BackendSpec {
    /// File name of the built library.
    ///
    /// Deterministic per backend, recipe, compiler and user flags, so a
    /// changed flag set never picks up a library built with the old one.
    pub fn artifact_name(&self, variant: &BuildVariant) -> String {
        format!(
            "{}-{}.{}",
            self.name,
            self.recipe.fingerprint(variant),
            std::env::consts::DLL_EXTENSION
        )
    }

    /// Absolute path of the built library under `cache_root`.
    pub fn artifact_path(&self, cache_root: &Path, variant: &BuildVariant) -> PathBuf {
        cache_root.join(self.artifact_name(variant))
    }

    /// Materialized files whose modification invalidates the artifact.
    pub fn watched_paths(&self, cache_root: &Path) -> Vec<PathBuf> {
        self.sources
            .iter()
            .map(|e| cache_root.join(&e.relative_path))
            .collect()
    }
}
