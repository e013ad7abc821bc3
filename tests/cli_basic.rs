//! Integration tests for basic CLI behavior.
//!
//! Tests that the binary exists, accepts standard flags, each subcommand
//! responds to `--help`, and the offline commands work without a network.

#![allow(deprecated)] // cargo_bin deprecation, replacement not yet stable

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: get a Command for the `flux` binary.
fn flux() -> Command {
    Command::cargo_bin("flux").expect("binary 'flux' should be built")
}

fn temp_config(name: &str, content: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("flux-cli-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    flux()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: flux"))
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("candidates"))
        .stdout(predicate::str::contains("race"))
        .stdout(predicate::str::contains("probe"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn version_flag_shows_semver() {
    flux()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^flux \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn no_args_shows_error_and_usage() {
    flux()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: flux"));
}

#[test]
fn invalid_subcommand_fails() {
    flux()
        .arg("this-is-not-a-real-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ─── Subcommand help ─────────────────────────────────────────────────────────

#[test]
fn resolve_help() {
    flux()
        .args(["resolve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolve content"))
        .stdout(predicate::str::contains("<ID>"))
        .stdout(predicate::str::contains("--title"))
        .stdout(predicate::str::contains("--season"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn candidates_help() {
    flux()
        .args(["candidates", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ranked candidates"))
        .stdout(predicate::str::contains("--sticky"));
}

#[test]
fn race_help() {
    flux()
        .args(["race", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<ENDPOINT>"))
        .stdout(predicate::str::contains("<URLS>"))
        .stdout(predicate::str::contains("--timeout"));
}

// ─── Argument validation ─────────────────────────────────────────────────────

#[test]
fn resolve_requires_title() {
    flux()
        .args(["resolve", "tt0111161"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--title"));
}

#[test]
fn race_requires_urls() {
    flux()
        .args(["race", "https://racer.example.dev"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("<URLS>"));
}

#[test]
fn probe_rejects_invalid_url() {
    flux()
        .args(["probe", "not a url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid URL"));
}

// ─── Config ──────────────────────────────────────────────────────────────────

#[test]
fn config_path_honours_flag() {
    flux()
        .args(["config", "--path", "--config", "/tmp/somewhere/flux.toml"])
        .assert()
        .success()
        .stdout("/tmp/somewhere/flux.toml\n");
}

#[test]
fn config_shows_defaults_when_missing() {
    flux()
        .args(["config", "--config", "/nonexistent/flux/config.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("WebStreamer"))
        .stdout(predicate::str::contains("[racing]"))
        .stderr(predicate::str::contains("showing defaults"));
}

#[test]
fn config_reads_file() {
    let path = temp_config(
        "custom.toml",
        "quality_ceiling = \"720p\"\n\n[[addons]]\nname = \"Local\"\nbase_url = \"http://127.0.0.1:7000\"\n",
    );
    flux()
        .arg("config")
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("quality_ceiling = \"720p\""))
        .stdout(predicate::str::contains("http://127.0.0.1:7000"))
        .stdout(predicate::str::contains("nuviostreams").not());
}

#[test]
fn config_rejects_invalid_toml() {
    let path = temp_config("broken.toml", "quality_ceiling = \"8K\"\n");
    flux()
        .arg("config")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid TOML"));
}
