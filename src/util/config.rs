//! Configuration file support for Kiln.
//!
//! Kiln supports two configuration file locations:
//! - Global: `<kiln home>/config.toml` - User-wide defaults
//! - Project: `.kiln/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. Environment
//! variables (`KILN_GPU`, `CC`) override both, and command-line flags
//! override everything.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::Policy;

/// Kiln configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GPU backend settings
    pub gpu: GpuConfig,

    /// Compiler overrides
    pub toolchain: ToolchainSettings,

    /// Where bundled backend sources come from
    pub resources: ResourcesConfig,
}

/// GPU backend settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    /// Backend policy (auto, disable, apple, nvidia, amd)
    pub policy: Option<Policy>,

    /// Rebuild the backend even when the cached library is fresh
    pub recompile: Option<bool>,

    /// Never build; load the cached library or give up
    pub nocompile: Option<bool>,

    /// Kill the compiler after this many seconds (unbounded when unset)
    pub build_timeout_secs: Option<u64>,
}

/// Toolchain settings for the backend build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// C compiler name or path (e.g., clang, /usr/bin/cc)
    pub cc: Option<PathBuf>,

    /// Additional compiler flags
    pub cflags: Vec<String>,
}

/// Resource settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
    /// Directory holding the backend source tree
    pub dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.gpu.policy.is_some() {
            self.gpu.policy = other.gpu.policy;
        }
        if other.gpu.recompile.is_some() {
            self.gpu.recompile = other.gpu.recompile;
        }
        if other.gpu.nocompile.is_some() {
            self.gpu.nocompile = other.gpu.nocompile;
        }
        if other.gpu.build_timeout_secs.is_some() {
            self.gpu.build_timeout_secs = other.gpu.build_timeout_secs;
        }

        if other.toolchain.cc.is_some() {
            self.toolchain.cc = other.toolchain.cc;
        }
        if !other.toolchain.cflags.is_empty() {
            self.toolchain.cflags = other.toolchain.cflags;
        }

        if other.resources.dir.is_some() {
            self.resources.dir = other.resources.dir;
        }
    }

    /// Apply environment overrides, read through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(gpu) = var("KILN_GPU").filter(|v| !v.is_empty()) {
            let policy = gpu
                .parse::<Policy>()
                .with_context(|| format!("invalid KILN_GPU value `{}`", gpu))?;
            self.gpu.policy = Some(policy);
        }
        if let Some(cc) = var("CC").filter(|v| !v.is_empty()) {
            self.toolchain.cc = Some(PathBuf::from(cc));
        }
        Ok(())
    }

    /// The effective GPU policy.
    pub fn policy(&self) -> Policy {
        self.gpu.policy.unwrap_or_default()
    }

    pub fn recompile(&self) -> bool {
        self.gpu.recompile.unwrap_or(false)
    }

    pub fn nocompile(&self) -> bool {
        self.gpu.nocompile.unwrap_or(false)
    }

    /// The compiler timeout, if any.
    pub fn build_timeout(&self) -> Option<Duration> {
        self.gpu
            .build_timeout_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.kiln/config.toml)
/// 2. Global config (<kiln home>/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}
