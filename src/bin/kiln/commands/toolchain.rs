//! `kiln toolchain` command

use anyhow::Result;

use crate::cli::ToolchainArgs;
use kiln::builder::native::NativeBuilder;
use kiln::builder::toolchain::{detect_compiler, install_hint};
use kiln::core::metal::metal;
use kiln::core::{BuildVariant, Platform};
use kiln::util::process::ProcessBuilder;
use kiln::util::GlobalContext;

pub fn execute(args: ToolchainArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let configured = args.cc.or_else(|| ctx.config().toolchain.cc.clone());

    println!("Toolchain:");
    println!();

    let Some(compiler) = detect_compiler(configured.as_deref()) else {
        println!("  CC:     not found");
        println!();
        println!("  {}", install_hint());
        return Ok(());
    };

    println!("  CC:     {}", compiler.path().display());
    println!("  Family: {}", compiler.family());
    if let Ok(output) = ProcessBuilder::new(compiler.path()).arg("--version").exec() {
        if let Some(first_line) = String::from_utf8_lossy(&output.stdout).lines().next() {
            println!("          {}", first_line.trim());
        }
    }
    println!("  Host:   {}", Platform::host());
    println!();

    let spec = metal();
    let root = ctx.cache_root();
    let variant = BuildVariant {
        compiler: Some(compiler.path().to_path_buf()),
        cflags: ctx.config().toolchain.cflags.clone(),
    };
    let artifact = spec.artifact_path(&root, &variant);
    let command = NativeBuilder::new(Some(compiler))
        .with_cflags(variant.cflags)
        .command(&spec.recipe, &root, &artifact)?;

    println!("Build command for {}:", spec.name);
    println!("  {}", command.to_process().display_command());

    Ok(())
}
