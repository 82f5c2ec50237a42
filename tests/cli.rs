//! CLI integration tests: spawn the built binary against a temp workspace.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn askdesk_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("askdesk");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    fs::write(
        docs_dir.join("okta-mfa.md"),
        "# Okta MFA reset\n\nokta okta okta okta\nSteps to reset MFA in Okta.",
    )
    .unwrap();
    fs::write(
        docs_dir.join("vpn.md"),
        "# VPN\n\nConnecting to the VPN from home requires the client.",
    )
    .unwrap();
    fs::write(
        docs_dir.join("printers.txt"),
        "Fixing common printer jams on floor 3.",
    )
    .unwrap();

    let config_content = format!(
        r#"[docs]
dir = "{}/docs"

[retrieval]
top_k = 3

[server]
bind = "127.0.0.1:7331"
"#,
        root.display()
    );
    let config_path = root.join("askdesk.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_askdesk(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = askdesk_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run askdesk binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_search_ranks_matching_document_first() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_askdesk(&config_path, &["search", "reset okta mfa"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);

    let first = stdout.lines().next().unwrap();
    assert!(first.starts_with("1. ["), "unexpected first line: {}", first);
    assert!(first.contains("okta-mfa.md"));
    assert!(stdout.contains("excerpt:"));
}

#[test]
fn test_search_respects_k() {
    let (_tmp, config_path) = setup_test_env();

    // all three docs mention at least one of these words, but k caps output
    let (stdout, _, success) =
        run_askdesk(&config_path, &["search", "okta vpn printer", "--k", "1"]);
    assert!(success);
    assert!(stdout.contains("1. ["));
    assert!(!stdout.contains("2. ["));
}

#[test]
fn test_search_without_matches_prints_no_results() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_askdesk(&config_path, &["search", "kubernetes"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_docs_lists_cache_contents() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_askdesk(&config_path, &["docs"]);
    assert!(success, "docs failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("DOCUMENT"));
    assert!(stdout.contains("okta-mfa.md"));
    assert!(stdout.contains("vpn.md"));
    assert!(stdout.contains("printers.txt"));
    assert!(stdout.contains("3 documents loaded"));
}

#[test]
fn test_missing_docs_dir_is_not_an_error() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("askdesk.toml");
    fs::write(
        &config_path,
        format!("[docs]\ndir = \"{}/nonexistent\"\n", tmp.path().display()),
    )
    .unwrap();

    let (stdout, _, success) = run_askdesk(&config_path, &["docs"]);
    assert!(success);
    assert!(stdout.contains("0 documents loaded"));
}
