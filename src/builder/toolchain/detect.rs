//! Compiler detection.

use std::path::{Path, PathBuf};

use super::{Compiler, CompilerFamily};
use crate::util::process::{find_c_compiler, find_executable, ProcessBuilder};

/// Find a C compiler, preferring `configured` when given.
///
/// A configured name is looked up on PATH; a configured path is used as-is
/// if it exists. Returns `None` when nothing usable is found.
pub fn detect_compiler(configured: Option<&Path>) -> Option<Compiler> {
    let cc = match configured {
        Some(cc) => resolve_configured(cc)?,
        None => find_c_compiler()?,
    };

    let family = detect_compiler_family(&cc);
    tracing::debug!("using C compiler {} ({})", cc.display(), family);
    Some(Compiler::new(cc, family))
}

fn resolve_configured(cc: &Path) -> Option<PathBuf> {
    if cc.components().count() > 1 || cc.is_absolute() {
        return cc.exists().then(|| cc.to_path_buf());
    }
    let found = find_executable(cc);
    if found.is_none() {
        tracing::debug!("configured compiler `{}` not on PATH", cc.display());
    }
    found
}

/// What to tell the user when no compiler is available.
pub fn install_hint() -> &'static str {
    if cfg!(target_os = "macos") {
        "install the command line developer tools: xcode-select --install"
    } else if cfg!(windows) {
        "install clang or MinGW-w64 and add it to PATH, or set CC"
    } else {
        "install a C/C++ compiler (e.g. `apt install build-essential`), or set CC"
    }
}

/// Detect whether the compiler is GCC, Clang, or Apple Clang.
fn detect_compiler_family(cc: &Path) -> CompilerFamily {
    let name = cc
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

    if name.contains("gcc") || name.contains("g++") {
        return CompilerFamily::Gcc;
    }

    match version_banner(cc) {
        Some(banner) if banner.contains("apple") => CompilerFamily::AppleClang,
        Some(banner) if banner.contains("clang") => CompilerFamily::Clang,
        Some(_) => CompilerFamily::Gcc,
        None if name.contains("clang") => CompilerFamily::Clang,
        None => CompilerFamily::Gcc,
    }
}

fn version_banner(cc: &Path) -> Option<String> {
    let output = ProcessBuilder::new(cc)
        .arg("--version")
        .env("LC_ALL", "C")
        .exec()
        .ok()?;
    Some(String::from_utf8_lossy(&output.stdout).to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_configured_compiler() {
        assert!(detect_compiler(Some(Path::new("/definitely/not/a/cc"))).is_none());
        assert!(detect_compiler(Some(Path::new("kiln-no-such-compiler"))).is_none());
    }

    #[test]
    fn test_family_from_name() {
        assert_eq!(
            detect_compiler_family(Path::new("/nonexistent/x86_64-linux-gnu-gcc")),
            CompilerFamily::Gcc
        );
        assert_eq!(
            detect_compiler_family(Path::new("/nonexistent/clang-17")),
            CompilerFamily::Clang
        );
    }

    #[test]
    fn test_install_hint_is_actionable() {
        let hint = install_hint();
        if cfg!(target_os = "macos") {
            assert!(hint.contains("xcode-select --install"));
        } else {
            assert!(hint.contains("CC"));
        }
    }
}
