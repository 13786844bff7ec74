//! Global context for Kiln operations.
//!
//! Provides centralized access to configuration, paths, and environment.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};

use crate::util::config::{load_config, Config};

/// Environment variable overriding the Kiln home directory.
pub const KILN_HOME_ENV: &str = "KILN_HOME";

/// Project directories for Kiln
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("com", "kiln", "kiln"));

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global Kiln data
    home: PathBuf,

    /// Whether to use verbose output
    verbose: bool,

    /// Merged configuration
    config: Config,
}

impl GlobalContext {
    /// Create a context from the process environment.
    ///
    /// Reads `KILN_HOME`, the global and project config files, then
    /// `KILN_GPU` and `CC`.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        let home = match std::env::var_os(KILN_HOME_ENV) {
            Some(home) if !home.is_empty() => PathBuf::from(home),
            _ => default_home(),
        };

        let mut ctx = Self::with_paths(cwd, home);
        ctx.config
            .apply_env(|key| std::env::var(key).ok())
            .context("invalid environment configuration")?;
        Ok(ctx)
    }

    /// Create a context with explicit paths, ignoring the environment.
    pub fn with_paths(cwd: PathBuf, home: PathBuf) -> Self {
        let config = load_config(
            &home.join("config.toml"),
            &cwd.join(".kiln").join("config.toml"),
        );
        GlobalContext {
            cwd,
            home,
            verbose: false,
            config,
        }
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the Kiln home directory.
    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable configuration, for command-line overrides.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Get the project configuration file path.
    pub fn project_config_path(&self) -> PathBuf {
        self.cwd.join(".kiln").join("config.toml")
    }

    /// Root under which backend sources are materialized and built.
    ///
    /// Versioned by this crate's version, so an upgrade never reuses
    /// sources or libraries from another release.
    pub fn cache_root(&self) -> PathBuf {
        self.home.join("v").join(env!("CARGO_PKG_VERSION"))
    }
}

fn default_home() -> PathBuf {
    if let Some(dirs) = PROJECT_DIRS.as_ref() {
        return dirs.cache_dir().to_path_buf();
    }
    // Fallback to ~/.kiln
    BaseDirs::new()
        .map(|b| b.home_dir().join(".kiln"))
        .unwrap_or_else(|| PathBuf::from(".kiln"))
}
