//! `kiln cache` command
//!
//! Inspect the versioned directory holding materialized sources and built
//! backend libraries.

use std::path::Path;

use anyhow::Result;
use walkdir::WalkDir;

use crate::cli::{CacheArgs, CacheCommands};
use kiln::util::fs::{dir_size, format_size};
use kiln::util::GlobalContext;

pub fn execute(args: CacheArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;
    match args.command {
        CacheCommands::Path => {
            println!("{}", ctx.cache_root().display());
            Ok(())
        }
        CacheCommands::List => list_cache(&ctx.cache_root()),
    }
}

/// List cached files with their sizes.
fn list_cache(root: &Path) -> Result<()> {
    println!("Cache directory: {}", root.display());
    println!();

    if !root.exists() {
        println!("  (empty)");
        return Ok(());
    }

    let mut libraries = Vec::new();
    let mut sources = 0usize;
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_library = entry
            .path()
            .extension()
            .is_some_and(|ext| ext == std::env::consts::DLL_EXTENSION);
        if is_library {
            libraries.push(entry);
        } else {
            sources += 1;
        }
    }

    println!("Libraries:");
    if libraries.is_empty() {
        println!("  (none)");
    }
    for lib in &libraries {
        let size = lib.metadata().map(|m| m.len()).unwrap_or(0);
        let name = lib.path().strip_prefix(root).unwrap_or(lib.path());
        println!("  {} ({})", name.display(), format_size(size));
    }
    println!();

    println!("Sources: {} files", sources);
    println!("Total:   {}", format_size(dir_size(root)?));
    Ok(())
}
