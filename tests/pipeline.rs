//! End-to-end tests against the `rpipe` binary.

use std::process::Command as StdCommand;
use std::time::Duration;

use assert_cmd::Command;
use tempfile::TempDir;

const PIPELINE_FAILURE: i32 = 1;
const INVOCATION_ERROR: i32 = 2;

/// Generous upper bound; anything that needs it is a hang.
const HANG_LIMIT: Duration = Duration::from_secs(20);

fn rpipe() -> Command {
    let mut cmd = Command::cargo_bin("rpipe").expect("binary built");
    cmd.env_remove("RPIPE_DELIMITER")
        .env("RPIPE_COLOR", "never")
        .timeout(HANG_LIMIT);
    cmd
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn identity_stages_round_trip_bytes() {
    let input: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
    rpipe()
        .args(["cat", "|", "cat", "|", "cat", "|", "cat"])
        .write_stdin(input.clone())
        .assert()
        .success()
        .stdout(input);
}

#[test]
fn single_stage_matches_direct_invocation() {
    let direct = StdCommand::new("echo")
        .args(["hello", "world"])
        .output()
        .expect("echo runs");
    rpipe()
        .args(["echo", "hello", "world"])
        .assert()
        .success()
        .stdout(direct.stdout);
}

#[test]
fn invoker_streams_reach_first_and_last_stage() {
    rpipe()
        .args(["tr", "a-z", "A-Z", "|", "sort"])
        .write_stdin("banana\napple\n")
        .assert()
        .success()
        .stdout("APPLE\nBANANA\n");
}

#[test]
fn misplaced_delimiter_spawns_nothing() {
    let dir = TempDir::new().expect("temp dir");
    let marker = dir.path().join("spawned");
    let marker = marker.to_str().expect("utf-8 temp path");

    for args in [
        vec!["|", "touch", marker],
        vec!["touch", marker, "|"],
        vec!["touch", marker, "|", "|", "true"],
    ] {
        let output = rpipe().args(&args).output().expect("rpipe runs");
        assert_eq!(output.status.code(), Some(INVOCATION_ERROR), "{args:?}");
        assert!(stderr_of(&output).contains("empty"), "{args:?}");
    }
    assert!(!dir.path().join("spawned").exists());
}

#[test]
fn no_arguments_is_usage_error() {
    let output = rpipe().output().expect("rpipe runs");
    assert_eq!(output.status.code(), Some(INVOCATION_ERROR));
    assert!(stderr_of(&output).contains("Usage"));
}

#[test]
fn one_failing_stage_fails_the_pipeline() {
    rpipe()
        .args(["true", "|", "false", "|", "true"])
        .assert()
        .code(PIPELINE_FAILURE);
}

#[test]
fn last_stage_failure_is_reported() {
    rpipe()
        .args(["echo", "x", "|", "sh", "-c", "cat >/dev/null; exit 7"])
        .assert()
        .code(PIPELINE_FAILURE);
}

#[test]
fn unknown_command_does_not_hang() {
    let output = rpipe()
        .args(["doesnotexist123", "|", "cat"])
        .output()
        .expect("rpipe runs");
    assert_eq!(output.status.code(), Some(PIPELINE_FAILURE));
    let stderr = stderr_of(&output);
    assert!(stderr.contains("unknown command"), "{stderr}");
    assert!(stderr.contains("doesnotexist123"), "{stderr}");
}

#[test]
fn unknown_command_downstream_does_not_hang() {
    let output = rpipe()
        .args(["yes", "|", "doesnotexist123"])
        .output()
        .expect("rpipe runs");
    assert_eq!(output.status.code(), Some(PIPELINE_FAILURE));
}

#[test]
fn writer_sees_broken_pipe_when_reader_exits() {
    rpipe()
        .args(["yes", "|", "true", "|", "cat"])
        .assert()
        .code(PIPELINE_FAILURE)
        .stdout("");
}

#[test]
fn early_exiting_reader_with_successful_writer() {
    rpipe()
        .args(["echo", "one", "|", "head", "-n", "1"])
        .assert()
        .success()
        .stdout("one\n");
}

#[test]
fn delimiter_inside_argument_is_literal() {
    rpipe()
        .args(["echo", "a|b"])
        .assert()
        .success()
        .stdout("a|b\n");
}

#[test]
fn help_only_in_first_position() {
    let output = rpipe().arg("--help").output().expect("rpipe runs");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Usage"));
    rpipe().args(["echo", "-h"]).assert().success().stdout("-h\n");
}

#[test]
fn double_dash_ends_options() {
    rpipe()
        .args(["--", "printf", "%s\\n", "--version"])
        .assert()
        .success()
        .stdout("--version\n");
}

#[test]
fn delimiter_from_environment() {
    rpipe()
        .env("RPIPE_DELIMITER", ":::")
        .args(["echo", "|", ":::", "cat"])
        .assert()
        .success()
        .stdout("|\n");
}
