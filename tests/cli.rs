//! Integration tests for the `installer` binary's CLI surface.

use std::process::Command;

fn installer() -> Command {
    Command::new(env!("CARGO_BIN_EXE_spm"))
}

#[test]
fn help_mentions_project_and_install_dirs() {
    let out = installer().arg("--help").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout).to_lowercase();
    assert!(stdout.contains("project_dir") || stdout.contains("project-dir"));
    assert!(stdout.contains("registry"));
}

#[test]
fn missing_manifest_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let out = installer().arg(dir.path()).output().unwrap();
    assert!(!out.status.success(), "installer should fail without spm-package.json");
}

#[test]
fn missing_manifest_prints_error_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let out = installer().arg(dir.path()).output().unwrap();
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("error:"), "stdout was: {stdout}");
}
