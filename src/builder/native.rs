//! Native build driver.
//!
//! Compiles a backend's translation units into one shared library. The
//! compiler writes to a uniquely named temporary file beside the artifact,
//! which is renamed into place only after a successful build, so the
//! artifact path only ever holds a complete library.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::builder::toolchain::{install_hint, CompileCommand, Compiler};
use crate::core::BuildRecipe;
use crate::util::fs::{make_dirs, parent_dir};
use crate::util::process::ProcessError;

/// How many trailing stderr lines a compile failure keeps.
const STDERR_TAIL: usize = 20;

/// Error building a backend library.
#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error("no C compiler found")]
    #[diagnostic(code(kiln::build::toolchain_missing), help("{hint}"))]
    ToolchainMissing { hint: &'static str },

    #[error("compiler failed with {status}\n{stderr}")]
    #[diagnostic(
        code(kiln::build::compile_failed),
        help("the failing command was: {command}")
    )]
    CompileFailed {
        status: String,
        command: String,
        stderr: String,
    },

    #[error("failed to run `{}`: {source}", .program.display())]
    #[diagnostic(code(kiln::build::spawn_failed))]
    SpawnFailed {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("`{}` did not finish within {}s and was killed", .program.display(), .after.as_secs())]
    #[diagnostic(
        code(kiln::build::timed_out),
        help("raise gpu.build_timeout_secs, or unset it to wait indefinitely")
    )]
    TimedOut { program: PathBuf, after: Duration },

    #[error("failed to prepare {}: {source}", .path.display())]
    #[diagnostic(code(kiln::build::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<ProcessError> for BuildError {
    fn from(err: ProcessError) -> Self {
        if err.is_not_found() {
            return BuildError::ToolchainMissing {
                hint: install_hint(),
            };
        }
        match err {
            ProcessError::Spawn { program, source } | ProcessError::Wait { program, source } => {
                BuildError::SpawnFailed { program, source }
            }
            ProcessError::TimedOut { program, after } => BuildError::TimedOut { program, after },
        }
    }
}

/// Builds recipes with one resolved compiler.
#[derive(Debug, Clone, Default)]
pub struct NativeBuilder {
    compiler: Option<Compiler>,
    extra_cflags: Vec<String>,
    timeout: Option<Duration>,
}

impl NativeBuilder {
    /// Create a builder. `None` means no compiler could be found; every
    /// build then fails with [`BuildError::ToolchainMissing`].
    pub fn new(compiler: Option<Compiler>) -> Self {
        NativeBuilder {
            compiler,
            extra_cflags: Vec::new(),
            timeout: None,
        }
    }

    /// Append user flags after the recipe's defines.
    pub fn with_cflags(mut self, cflags: Vec<String>) -> Self {
        self.extra_cflags = cflags;
        self
    }

    /// Kill the compiler if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn compiler(&self) -> Option<&Compiler> {
        self.compiler.as_ref()
    }

    /// The command that would build `recipe` from sources under `root`.
    pub fn command(
        &self,
        recipe: &BuildRecipe,
        root: &Path,
        artifact: &Path,
    ) -> Result<CompileCommand, BuildError> {
        let compiler = self.compiler.as_ref().ok_or(BuildError::ToolchainMissing {
            hint: install_hint(),
        })?;
        Ok(CompileCommand::from_recipe(compiler, recipe, root, artifact)
            .flags(self.extra_cflags.iter().cloned()))
    }

    /// Build `recipe` into `artifact`.
    pub fn build(
        &self,
        recipe: &BuildRecipe,
        root: &Path,
        artifact: &Path,
    ) -> Result<(), BuildError> {
        let command = self.command(recipe, root, artifact)?;
        build(&command, self.timeout)
    }
}

/// Run `command` and install its output at `command.output()`.
///
/// On any failure the temporary output is removed and a previously
/// installed artifact is left as it was.
pub fn build(command: &CompileCommand, timeout: Option<Duration>) -> Result<(), BuildError> {
    let artifact = command.output().to_path_buf();
    let dir = parent_dir(&artifact);
    make_dirs(dir).map_err(|source| BuildError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let file_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = tempfile::Builder::new()
        .prefix(&format!("{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|source| BuildError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    let command = command.clone().with_output(tmp.path());
    let process = command.to_process();
    tracing::info!("building {}", artifact.display());
    tracing::debug!("executing: {}", process.display_command());

    // `tmp` is deleted on drop for every early return below.
    let output = process.exec_with_timeout(timeout)?;

    if !output.status.success() {
        let stderr = output.stderr_lossy();
        return Err(BuildError::CompileFailed {
            status: output.status.to_string(),
            command: process.display_command(),
            stderr: tail(&stderr, STDERR_TAIL),
        });
    }

    tmp.persist(&artifact).map_err(|e| BuildError::Io {
        path: artifact.clone(),
        source: e.error,
    })?;

    tracing::info!("built {}", artifact.display());
    Ok(())
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
