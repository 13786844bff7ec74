//! The provisioning pipeline.
//!
//! detect → materialize → (preprocess, build if stale) → load → register.
//! Each step either succeeds or aborts the run with a [`ProvisionError`];
//! nothing is retried.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use thiserror::Error;

use crate::builder::freshness::needs_build;
use crate::builder::materialize::{materialize, refresh_shader};
use crate::builder::native::{BuildError, NativeBuilder};
use crate::builder::preprocess::{inline_headers, PreprocessError};
use crate::builder::toolchain::{detect_compiler, Compiler};
use crate::core::{detect, BackendId, BackendSpec, BuildVariant, Ineligible, Platform, Policy};
use crate::loader::{load_backend, BackendRegistry, LinkError, LoadedBackend};
use crate::sources::{ExtractionError, ResourceStore};
use crate::util::fs::make_dirs;
use crate::util::GlobalContext;

/// Any failure of the provisioning pipeline.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("backend not eligible: {0}")]
    Ineligible(#[from] Ineligible),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Produces a loaded, registered backend.
pub trait Provisioner: Send + Sync {
    /// The backend this provisioner provides.
    fn backend(&self) -> BackendId;

    /// The policy the run is subject to.
    fn policy(&self) -> Policy;

    /// Run the pipeline once.
    fn provision(&self) -> Result<LoadedBackend, ProvisionError>;
}

/// Flags shaping a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionOptions {
    /// Rebuild even when the cached library is fresh
    pub recompile: bool,
    /// Skip extraction and build; load whatever library is cached
    pub nocompile: bool,
    /// Compiler override
    pub cc: Option<PathBuf>,
    /// Extra compiler flags
    pub cflags: Vec<String>,
    /// Compiler timeout
    pub build_timeout: Option<Duration>,
}

/// The full pipeline for one [`BackendSpec`].
pub struct PipelineProvisioner {
    spec: BackendSpec,
    platform: Platform,
    policy: Policy,
    cache_root: PathBuf,
    store: Arc<dyn ResourceStore>,
    registry: Arc<dyn BackendRegistry>,
    options: ProvisionOptions,
    compiler: OnceLock<Option<Compiler>>,
}

impl PipelineProvisioner {
    /// Provision `spec` on the host under `Policy::Auto`.
    pub fn new(
        spec: BackendSpec,
        cache_root: impl Into<PathBuf>,
        store: Arc<dyn ResourceStore>,
        registry: Arc<dyn BackendRegistry>,
    ) -> Self {
        PipelineProvisioner {
            spec,
            platform: Platform::host(),
            policy: Policy::Auto,
            cache_root: cache_root.into(),
            store,
            registry,
            options: ProvisionOptions::default(),
            compiler: OnceLock::new(),
        }
    }

    /// Configure from the global context: cache root, policy and build flags.
    pub fn from_context(
        gctx: &GlobalContext,
        spec: BackendSpec,
        store: Arc<dyn ResourceStore>,
        registry: Arc<dyn BackendRegistry>,
    ) -> Self {
        let config = gctx.config();
        PipelineProvisioner::new(spec, gctx.cache_root(), store, registry)
            .with_policy(config.policy())
            .with_options(ProvisionOptions {
                recompile: config.recompile(),
                nocompile: config.nocompile(),
                cc: config.toolchain.cc.clone(),
                cflags: config.toolchain.cflags.clone(),
                build_timeout: config.build_timeout(),
            })
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Pretend to run on `platform`.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_options(mut self, options: ProvisionOptions) -> Self {
        self.options = options;
        self.compiler = OnceLock::new();
        self
    }

    pub fn spec(&self) -> &BackendSpec {
        &self.spec
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// The compiler a build would use, looked up once.
    pub fn compiler(&self) -> Option<&Compiler> {
        self.compiler
            .get_or_init(|| detect_compiler(self.options.cc.as_deref()))
            .as_ref()
    }

    /// Host choices that shape the built library.
    pub fn variant(&self) -> BuildVariant {
        BuildVariant {
            compiler: self.compiler().map(|cc| cc.path().to_path_buf()),
            cflags: self.options.cflags.clone(),
        }
    }

    /// Where the built library lives.
    pub fn artifact_path(&self) -> PathBuf {
        self.spec.artifact_path(&self.cache_root, &self.variant())
    }

    /// The builder a run would use.
    pub fn builder(&self) -> NativeBuilder {
        NativeBuilder::new(self.compiler().cloned())
            .with_cflags(self.options.cflags.clone())
            .with_timeout(self.options.build_timeout)
    }

    /// Bring sources and library up to date. Returns whether a build ran.
    fn prepare(&self, artifact: &Path) -> Result<bool, ProvisionError> {
        let root = &self.cache_root;
        make_dirs(root).map_err(|source| ExtractionError::CreateDir {
            path: root.clone(),
            source,
        })?;

        let mut materialized = materialize(&self.spec.sources, self.store.as_ref(), root)?;
        if let Some(shader) = &self.spec.shader {
            refresh_shader(
                shader,
                &self.spec.sources,
                self.store.as_ref(),
                root,
                &mut materialized,
            )?;
        }
        let watched = self.spec.watched_paths(root);
        let rebuild = materialized.rebuild_needed()
            || needs_build(artifact, &watched, self.options.recompile);

        if !rebuild {
            tracing::debug!("using cached {}", artifact.display());
            return Ok(false);
        }

        // Checked before every build: an inlined shader has no markers left.
        if let Some(shader) = &self.spec.shader {
            let headers: Vec<PathBuf> = shader.headers.iter().map(|h| root.join(h)).collect();
            inline_headers(&root.join(&shader.shader), &headers)?;
        }

        self.builder().build(&self.spec.recipe, root, artifact)?;
        Ok(true)
    }
}

impl Provisioner for PipelineProvisioner {
    fn backend(&self) -> BackendId {
        self.spec.id
    }

    fn policy(&self) -> Policy {
        self.policy
    }

    fn provision(&self) -> Result<LoadedBackend, ProvisionError> {
        detect(&self.platform, self.spec.platform, self.policy, self.spec.id)?;

        let artifact = self.artifact_path();
        if self.options.nocompile {
            tracing::debug!("nocompile: loading {} as is", artifact.display());
        } else if self.prepare(&artifact)? {
            tracing::info!("{} rebuilt", self.spec.name);
        }

        Ok(load_backend(
            &self.spec.name,
            &artifact,
            &self.spec.entry_points,
            self.registry.as_ref(),
        )?)
    }
}
