//! Integration tests for the `jujulink` binary.
//!
//! Argument parsing, help output, completions, config commands and error
//! handling, all without a live controller.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// A `jujulink` command isolated from the user's environment and config.
fn jujulink(home: &std::path::Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("jujulink");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env_remove("JUJULINK_PROFILE")
        .env_remove("JUJULINK_CONTROLLER")
        .env_remove("JUJULINK_MODEL")
        .env_remove("JUJULINK_USERNAME")
        .env_remove("JUJULINK_PASSWORD")
        .env_remove("JUJULINK_PROTOCOL")
        .env_remove("JUJULINK_OUTPUT")
        .env_remove("JUJULINK_INSECURE")
        .env_remove("JUJULINK_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = jujulink(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    jujulink(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("login")
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("models"))
            .and(predicate::str::contains("deploy"))
            .and(predicate::str::contains("offers")),
    );
}

#[test]
fn version_flag() {
    let home = tempfile::tempdir().unwrap();
    jujulink(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("jujulink"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    jujulink(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn completions_bash() {
    let home = tempfile::tempdir().unwrap();
    jujulink(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Config commands ─────────────────────────────────────────────────

#[test]
fn config_show_without_file_prints_defaults() {
    let home = tempfile::tempdir().unwrap();
    jujulink(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[defaults]"));
}

#[test]
fn config_path_points_at_toml() {
    let home = tempfile::tempdir().unwrap();
    jujulink(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn config_profiles_empty_table() {
    let home = tempfile::tempdir().unwrap();
    jujulink(home.path())
        .args(["config", "profiles", "--output", "plain"])
        .assert()
        .success();
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn invalid_subcommand_fails() {
    let home = tempfile::tempdir().unwrap();
    let output = jujulink(home.path()).arg("foobar").output().unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("foobar"));
}

#[test]
fn models_without_controller_reports_missing_config() {
    let home = tempfile::tempdir().unwrap();
    jujulink(home.path())
        .arg("models")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No controller configured"));
}

#[test]
fn unknown_profile_is_reported() {
    let home = tempfile::tempdir().unwrap();
    jujulink(home.path())
        .args(["--profile", "prod", "models"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Profile 'prod' not found"));
}

#[test]
fn controller_without_credentials_fails_with_auth_code() {
    let home = tempfile::tempdir().unwrap();
    jujulink(home.path())
        .args(["--controller", "127.0.0.1:1", "offers", "list"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No credentials"));
}

#[test]
fn unreachable_controller_fails_with_connection_code() {
    let home = tempfile::tempdir().unwrap();
    jujulink(home.path())
        .env("JUJULINK_PASSWORD", "secret")
        .args([
            "--controller",
            "ws://127.0.0.1:1/api",
            "--user",
            "admin",
            "--timeout",
            "5",
            "models",
        ])
        .assert()
        .code(7);
}

#[test]
fn invalid_output_format_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let output = jujulink(home.path())
        .args(["--output", "xml", "models"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("possible values"));
}

#[test]
fn deploy_requires_charm_or_archive() {
    let home = tempfile::tempdir().unwrap();
    jujulink(home.path()).arg("deploy").assert().code(2);
}
