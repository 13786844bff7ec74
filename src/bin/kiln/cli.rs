//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Kiln - lazily build, load and register native GPU backends
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision the GPU backend and report whether it is supported
    Probe(ProbeArgs),

    /// Inspect the backend cache
    Cache(CacheArgs),

    /// Show the compiler and the command a backend build would run
    Toolchain(ToolchainArgs),
}

#[derive(Args)]
pub struct ProbeArgs {
    /// GPU policy: auto, disable, apple, nvidia or amd
    #[arg(long, value_name = "POLICY")]
    pub gpu: Option<String>,

    /// Rebuild even when the cached library is fresh
    #[arg(long, conflicts_with = "nocompile")]
    pub recompile: bool,

    /// Never build; load the cached library as is
    #[arg(long)]
    pub nocompile: bool,

    /// Directory holding the backend source tree
    #[arg(long, value_name = "DIR")]
    pub resources: Option<PathBuf>,

    /// C compiler to build with
    #[arg(long, value_name = "PATH")]
    pub cc: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Print the versioned cache root
    Path,

    /// List cached files with their sizes
    List,
}

#[derive(Args)]
pub struct ToolchainArgs {
    /// C compiler to inspect instead of the configured one
    #[arg(long, value_name = "PATH")]
    pub cc: Option<PathBuf>,
}
