//! Integration tests for basic CLI behavior.
//!
//! Tests that the binary exists, accepts standard flags, and each subcommand
//! responds to `--help` with appropriate text.

#![allow(deprecated)] // cargo_bin deprecation — replacement not yet stable

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: get a Command for the `iptvprobe` binary.
fn iptvprobe() -> Command {
    Command::cargo_bin("iptvprobe").expect("binary 'iptvprobe' should be built")
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    iptvprobe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: iptvprobe"))
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("categories"))
        .stdout(predicate::str::contains("probe"))
        .stdout(predicate::str::contains("check-tools"));
}

#[test]
fn version_flag_shows_semver() {
    iptvprobe()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^iptvprobe \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn no_args_shows_error_and_usage() {
    iptvprobe()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: iptvprobe"));
}

#[test]
fn invalid_subcommand_fails() {
    iptvprobe()
        .arg("this-is-not-a-real-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ─── Subcommand help ─────────────────────────────────────────────────────────

#[test]
fn scan_help() {
    iptvprobe()
        .args(["scan", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Probe every channel"))
        .stdout(predicate::str::contains("<PLAYLIST>"))
        .stdout(predicate::str::contains("--category"))
        .stdout(predicate::str::contains("--extended-timeout"))
        .stdout(predicate::str::contains("--max-connections"))
        .stdout(predicate::str::contains("--workers"));
}

#[test]
fn categories_help() {
    iptvprobe()
        .args(["categories", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("group-title"))
        .stdout(predicate::str::contains("<PLAYLIST>"));
}

#[test]
fn probe_help() {
    iptvprobe()
        .args(["probe", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("single stream URL"))
        .stdout(predicate::str::contains("<URL>"))
        .stdout(predicate::str::contains("--no-decode-check"));
}
