//! Host C/C++ compiler and the shared-library compile command.
//!
//! Compiler detection priority:
//! 1. Configured compiler (`toolchain.cc` in config, or `CC`)
//! 2. Auto-detection (searching PATH for common compilers)

use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::BuildRecipe;
use crate::util::process::ProcessBuilder;

mod detect;

pub use detect::{detect_compiler, install_hint};

/// Compiler family, as far as flag compatibility is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerFamily {
    Gcc,
    Clang,
    AppleClang,
}

impl fmt::Display for CompilerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompilerFamily::Gcc => write!(f, "gcc"),
            CompilerFamily::Clang => write!(f, "clang"),
            CompilerFamily::AppleClang => write!(f, "apple-clang"),
        }
    }
}

/// A resolved C compiler driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiler {
    path: PathBuf,
    family: CompilerFamily,
}

impl Compiler {
    pub fn new(path: impl Into<PathBuf>, family: CompilerFamily) -> Self {
        Compiler {
            path: path.into(),
            family,
        }
    }

    /// Path of the compiler driver.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn family(&self) -> CompilerFamily {
        self.family
    }
}

impl fmt::Display for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path.display(), self.family)
    }
}

/// A single compile-and-link invocation producing a shared library.
///
/// Flags are collected by kind and rendered in one fixed order:
/// includes, optimization, PIC/shared, threading, defines, extra flags,
/// warnings, sources, output, frameworks, libraries.
#[derive(Debug, Clone)]
pub struct CompileCommand {
    compiler: PathBuf,
    include_dirs: Vec<PathBuf>,
    opt_level: u8,
    pthread: bool,
    defines: Vec<(String, Option<String>)>,
    flags: Vec<String>,
    suppress_warnings: bool,
    sources: Vec<PathBuf>,
    output: PathBuf,
    frameworks: Vec<String>,
    libs: Vec<String>,
}

impl CompileCommand {
    /// Start a shared-library build writing to `output`.
    pub fn shared_library(compiler: &Compiler, output: impl Into<PathBuf>) -> Self {
        CompileCommand {
            compiler: compiler.path().to_path_buf(),
            include_dirs: Vec::new(),
            opt_level: 0,
            pthread: false,
            defines: Vec::new(),
            flags: Vec::new(),
            suppress_warnings: false,
            sources: Vec::new(),
            output: output.into(),
            frameworks: Vec::new(),
            libs: Vec::new(),
        }
    }

    /// Build the command a recipe describes, with sources resolved under `root`.
    ///
    /// `root` is also the include directory, so materialized headers resolve
    /// the way they do in the source tree.
    pub fn from_recipe(
        compiler: &Compiler,
        recipe: &BuildRecipe,
        root: &Path,
        output: impl Into<PathBuf>,
    ) -> Self {
        let mut cmd = CompileCommand::shared_library(compiler, output)
            .include_dir(root)
            .opt_level(recipe.opt_level)
            .pthread(recipe.pthread)
            .suppress_warnings(recipe.suppress_warnings);

        for (name, value) in &recipe.defines {
            cmd = cmd.define(name, value.as_deref());
        }
        for src in &recipe.sources {
            cmd = cmd.source(root.join(src));
        }
        for fw in &recipe.frameworks {
            cmd = cmd.framework(fw);
        }
        for lib in &recipe.libs {
            cmd = cmd.lib(lib);
        }
        cmd
    }

    pub fn include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    pub fn opt_level(mut self, level: u8) -> Self {
        self.opt_level = level;
        self
    }

    pub fn pthread(mut self, yes: bool) -> Self {
        self.pthread = yes;
        self
    }

    /// Add `-D<name>` or `-D<name>=<value>`. The value is passed verbatim.
    pub fn define(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.defines.push((name.into(), value.map(str::to_string)));
        self
    }

    /// Add extra compiler flags, placed after the defines.
    pub fn flags(mut self, flags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    pub fn suppress_warnings(mut self, yes: bool) -> Self {
        self.suppress_warnings = yes;
        self
    }

    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    pub fn framework(mut self, name: impl Into<String>) -> Self {
        self.frameworks.push(name.into());
        self
    }

    pub fn lib(mut self, name: impl Into<String>) -> Self {
        self.libs.push(name.into());
        self
    }

    /// Where the compiler writes the library.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Redirect the output, keeping every other flag.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Render the argument list.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();

        for dir in &self.include_dirs {
            args.push(format!("-I{}", dir.display()));
        }

        args.push(format!("-O{}", self.opt_level));
        args.push("-fPIC".to_string());
        args.push("-shared".to_string());

        if self.pthread {
            args.push("-pthread".to_string());
        }

        for (name, value) in &self.defines {
            match value {
                Some(v) => args.push(format!("-D{}={}", name, v)),
                None => args.push(format!("-D{}", name)),
            }
        }

        args.extend(self.flags.iter().cloned());

        if self.suppress_warnings {
            args.push("-w".to_string());
        }

        for src in &self.sources {
            args.push(src.display().to_string());
        }

        args.push("-o".to_string());
        args.push(self.output.display().to_string());

        for fw in &self.frameworks {
            args.push("-framework".to_string());
            args.push(fw.clone());
        }

        for lib in &self.libs {
            args.push(format!("-l{}", lib));
        }

        args
    }

    /// The process to spawn.
    pub fn to_process(&self) -> ProcessBuilder {
        ProcessBuilder::new(&self.compiler).args(self.args())
    }
}
