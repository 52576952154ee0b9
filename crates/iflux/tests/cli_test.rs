//! Integration tests for the `iflux` CLI binary.
//!
//! Argument parsing, help output, completions, offline manifest validation,
//! and full runs against a wiremock iFLUX API.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

const NO_CONFIG: &str = "/tmp/iflux-cli-test-nonexistent";

/// Build a command for the `iflux` binary with env isolation.
///
/// Clears all `IFLUX_*` env vars and points config directories at
/// `config_home` so tests never touch the user's real configuration.
fn iflux_cmd_in(config_home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("iflux");
    cmd.env("HOME", config_home)
        .env("XDG_CONFIG_HOME", config_home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("IFLUX_PROFILE")
        .env_remove("IFLUX_API_URL")
        .env_remove("IFLUX_EMAIL")
        .env_remove("IFLUX_ORGANIZATION")
        .env_remove("IFLUX_OUTPUT")
        .env_remove("IFLUX_INSECURE")
        .env_remove("IFLUX_TIMEOUT")
        .env_remove("IFLUX_PASSWORD");
    cmd
}

fn iflux_cmd() -> assert_cmd::Command {
    iflux_cmd_in(Path::new(NO_CONFIG))
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn write_manifest(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

const VALID: &str = r#"
params:
  slack_active: false
eventTypes:
  bikeStation:
    data:
      name: Bike station status
      type: "{{baseUrl}}/schemas/bikeStation"
rules:
  notify:
    data:
      name: Notify
      active: true
      conditions:
        - eventTypeId: { $ref: eventTypes/bikeStation }
"#;

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = iflux_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    iflux_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("iFLUX")
            .and(predicate::str::contains("run"))
            .and(predicate::str::contains("validate"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_run_help_lists_policy_flags() {
    iflux_cmd().args(["run", "--help"]).assert().success().stdout(
        predicate::str::contains("--on-create-failure")
            .and(predicate::str::contains("--search-only"))
            .and(predicate::str::contains("--param")),
    );
}

#[test]
fn test_version_flag() {
    iflux_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("iflux"));
}

#[test]
fn test_completions_bash() {
    iflux_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_bad_param_syntax_is_a_usage_error() {
    let output = iflux_cmd()
        .args(["run", "seed.yaml", "--param", "novalue"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("NAME=VALUE"));
}

// ── Validate ────────────────────────────────────────────────────────

#[test]
fn test_validate_accepts_consistent_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write_manifest(&dir, "seed.yaml", VALID);

    iflux_cmd()
        .args(["validate", "--output", "plain"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("eventTypes\t1").and(predicate::str::contains("rules\t1")))
        .stderr(predicate::str::contains("2 items"));
}

#[test]
fn test_validate_reports_dangling_refs() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write_manifest(
        &dir,
        "seed.json",
        r#"{ "rules": { "notify": { "data": { "name": "Notify",
              "conditions": [ { "eventTypeId": { "$ref": "eventTypes/missing" } } ] } } } }"#,
    );

    let output = iflux_cmd()
        .args(["validate", "--output", "plain"])
        .arg(&manifest)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("rules/notify: reference 'eventTypes/missing' is not declared"),
        "{text}"
    );
}

#[test]
fn test_validate_missing_file() {
    let output = iflux_cmd()
        .args(["validate", "/tmp/iflux-cli-test-nonexistent/seed.yaml"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Could not read manifest"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_run_without_config_asks_for_one() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write_manifest(&dir, "seed.yaml", VALID);

    let output = iflux_cmd().arg("run").arg(&manifest).output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("iflux config init"));
}

#[cfg(target_os = "linux")]
#[test]
fn test_config_profiles_lists_default_first_class() {
    let home = tempfile::tempdir().unwrap();
    let config_dir = home.path().join("iflux");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        r#"
default_profile = "local"

[profiles.local]
api_url = "http://localhost:3000/v1"
password = "s3cret"

[profiles.staging]
api_url = "https://staging.iflux.io/v1"
"#,
    )
    .unwrap();

    iflux_cmd_in(home.path())
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::diff("local *\nstaging\n"));

    iflux_cmd_in(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("password = \"****\"").and(predicate::str::contains("s3cret").not()));
}

// ── Runs against a mock API ─────────────────────────────────────────

async fn mount_existing_session(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/auth/signin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "jwt" })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/organizations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 5 }])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/eventTypes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 12 }])))
        .mount(server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/v1/eventTypes/12"))
        .respond_with(ResponseTemplate::new(304))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/rules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

/// Run `iflux run` off the async runtime so the mock server keeps serving.
async fn run_against(server: &MockServer, manifest: PathBuf, extra: &[&str]) -> std::process::Output {
    let api_url = format!("{}/v1", server.uri());
    let extra: Vec<String> = extra.iter().map(ToString::to_string).collect();
    tokio::task::spawn_blocking(move || {
        iflux_cmd()
            .env("IFLUX_PASSWORD", "s3cret")
            .args(["--api-url", &api_url, "--email", "admin@iflux.io"])
            .args(["--organization", "HEIG-VD", "--output", "plain", "run"])
            .arg(&manifest)
            .args(&extra)
            .output()
            .unwrap()
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_completes_and_prints_ids() {
    let server = MockServer::start().await;
    mount_existing_session(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/rules"))
        .respond_with(ResponseTemplate::new(201).insert_header("Location", "/v1/rules/17"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let manifest = write_manifest(&dir, "seed.yaml", VALID);
    let output = run_against(&server, manifest, &[]).await;

    let text = combined_output(&output);
    assert_eq!(output.status.code(), Some(0), "{text}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("eventTypes/bikeStation\t12"), "{stdout}");
    assert!(stdout.contains("rules/notify\t17"), "{stdout}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_rule_halts_with_exit_code() {
    let server = MockServer::start().await;
    mount_existing_session(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/rules"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({ "message": "conditions invalid" })),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let manifest = write_manifest(&dir, "seed.yaml", VALID);

    let halted = run_against(&server, manifest.clone(), &[]).await;
    assert_eq!(halted.status.code(), Some(9), "{}", combined_output(&halted));
    assert!(combined_output(&halted).contains("rules/notify"));

    let skipped = run_against(&server, manifest, &["--on-create-failure", "skip"]).await;
    assert_eq!(skipped.status.code(), Some(10), "{}", combined_output(&skipped));
}
