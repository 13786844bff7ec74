//! CLI integration tests for Kiln.
//!
//! Every test runs with its own `KILN_HOME`, so nothing touches the user's cache.

use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// The kiln binary with an isolated home and project directory.
fn kiln(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.env("KILN_HOME", home.path())
        .env_remove("KILN_GPU")
        .current_dir(home.path());
    cmd
}

fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn is_apple_silicon() -> bool {
    cfg!(all(target_os = "macos", target_arch = "aarch64"))
}

// ============================================================================
// kiln probe
// ============================================================================

#[test]
fn test_auto_never_fails() {
    let home = temp_dir();
    let empty = temp_dir();

    kiln(&home)
        .args(["probe", "--gpu", "auto", "--resources"])
        .arg(empty.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Apple Metal"))
        .stdout(predicate::str::contains("policy: auto"));
}

#[test]
fn test_disabled_reports_unsupported() {
    let home = temp_dir();

    kiln(&home)
        .args(["probe", "--gpu", "disable"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unsupported"))
        .stdout(predicate::str::contains("state:  disabled"));

    // Nothing was materialized.
    assert!(!home.path().join("v").exists());
}

#[test]
fn test_json_report() {
    let home = temp_dir();

    let output = kiln(&home)
        .args(["probe", "--gpu", "disable", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["backend"], "apple");
    assert_eq!(report["policy"], "disable");
    assert_eq!(report["supported"], false);
    assert_eq!(report["state"], "disabled");
}

#[test]
fn test_forced_unavailable_is_fatal() {
    if is_apple_silicon() {
        return;
    }
    let home = temp_dir();
    let empty = temp_dir();

    kiln(&home)
        .args(["probe", "--gpu", "apple", "--resources"])
        .arg(empty.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("explicitly requested"))
        .stderr(predicate::str::contains("--gpu disable"));
}

#[test]
fn test_rejects_unknown_policy() {
    let home = temp_dir();

    kiln(&home)
        .args(["probe", "--gpu", "quantum"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --gpu"));
}

#[test]
fn test_reads_policy_from_project_config() {
    let home = temp_dir();
    fs::create_dir_all(home.path().join(".kiln")).unwrap();
    fs::write(
        home.path().join(".kiln").join("config.toml"),
        "[gpu]\npolicy = \"disable\"\n",
    )
    .unwrap();

    kiln(&home)
        .arg("probe")
        .assert()
        .success()
        .stdout(predicate::str::contains("policy: disable"));
}

// ============================================================================
// kiln cache
// ============================================================================

#[test]
fn test_cache_path_is_versioned() {
    let home = temp_dir();
    let expected = home
        .path()
        .join("v")
        .join(env!("CARGO_PKG_VERSION"))
        .display()
        .to_string();

    kiln(&home)
        .args(["cache", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected));
}

#[test]
fn test_cache_list_empty() {
    let home = temp_dir();

    kiln(&home)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(empty)"));
}

#[test]
fn test_cache_list_counts_files() {
    let home = temp_dir();
    let root = home.path().join("v").join(env!("CARGO_PKG_VERSION"));
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("ggml.h"), "/* header */").unwrap();
    fs::write(
        root.join(format!("ggml-metal-0123abcd.{}", std::env::consts::DLL_EXTENSION)),
        vec![0u8; 2048],
    )
    .unwrap();

    kiln(&home)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ggml-metal-0123abcd"))
        .stdout(predicate::str::contains("2.00 KiB"))
        .stdout(predicate::str::contains("Sources: 1 files"));
}

// ============================================================================
// kiln toolchain
// ============================================================================

#[test]
fn test_toolchain_with_missing_compiler() {
    let home = temp_dir();

    kiln(&home)
        .args(["toolchain", "--cc"])
        .arg(home.path().join("no-such-cc"))
        .assert()
        .success()
        .stdout(predicate::str::contains("not found"));
}

#[test]
fn test_help() {
    let home = temp_dir();

    kiln(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("probe"))
        .stdout(predicate::str::contains("cache"));
}
