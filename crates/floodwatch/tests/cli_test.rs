//! Integration tests for the `floodwatch` CLI binary.
//!
//! Argument parsing, help output, completions and error handling run
//! without a backend; the snapshot commands run against wiremock.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `floodwatch` binary with env isolation.
///
/// Clears all `FLOODWATCH_*` env vars and points the config file at a
/// path that does not exist, so tests never touch a real configuration.
fn floodwatch_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("floodwatch");
    cmd.env("HOME", "/tmp/floodwatch-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/floodwatch-cli-test-nonexistent")
        .env(
            "FLOODWATCH_CONFIG",
            "/tmp/floodwatch-cli-test-nonexistent/config.toml",
        )
        .env_remove("FLOODWATCH_PROFILE")
        .env_remove("FLOODWATCH_API_URL")
        .env_remove("FLOODWATCH_STREAM_URL")
        .env_remove("FLOODWATCH_TOKEN")
        .env_remove("FLOODWATCH_OUTPUT")
        .env_remove("FLOODWATCH_INSECURE")
        .env_remove("FLOODWATCH_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

async fn backend() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .and(header("authorization", "Bearer cli-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "device_id": "AWLR-01",
                "name": "Pintu Air Manggarai",
                "location": "Jakarta Selatan",
                "is_offline": false
            },
            {
                "device_id": "AWLR-02",
                "name": "Bendung Katulampa",
                "is_offline": true
            }
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/alerts"))
        .and(query_param("is_active", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 7,
                "device_id": "AWLR-01",
                "alert_type": "flood",
                "severity": "high",
                "message": "Water level 250 cm",
                "is_active": true,
                "triggered_at": "2026-03-01T08:05:00Z"
            },
            {
                "id": 8,
                "device_id": "AWLR-02",
                "alert_type": "rapid_rise",
                "is_active": true,
                "triggered_at": "2026-03-01T08:06:00Z"
            }
        ])))
        .mount(&server)
        .await;

    server
}

/// Run the binary off the async runtime so the mock server keeps serving.
async fn run_against(server: &MockServer, args: &[&str]) -> std::process::Output {
    let api_url = format!("{}/api", server.uri());
    let mut argv: Vec<String> = vec![
        "--api-url".into(),
        api_url,
        "--token".into(),
        "cli-token".into(),
    ];
    argv.extend(args.iter().map(|s| (*s).to_string()));

    tokio::task::spawn_blocking(move || floodwatch_cmd().args(&argv).output().unwrap())
        .await
        .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = floodwatch_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    floodwatch_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("sensors")
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("alerts"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    floodwatch_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("floodwatch"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    floodwatch_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    floodwatch_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = floodwatch_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_devices_without_backend_is_usage_error() {
    floodwatch_cmd()
        .arg("devices")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No backend configured"));
}

#[test]
fn test_unknown_profile_is_reported() {
    floodwatch_cmd()
        .args(["--profile", "nowhere", "devices"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nowhere"));
}

#[test]
fn test_missing_token_is_auth_error() {
    floodwatch_cmd()
        .args(["--api-url", "http://127.0.0.1:9/api", "devices"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No credentials"));
}

#[test]
fn test_invalid_alert_type_rejected() {
    let output = floodwatch_cmd()
        .args(["alerts", "--type", "earthquake"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_invalid_output_format() {
    let output = floodwatch_cmd()
        .args(["--output", "invalid", "devices"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_show_no_config() {
    floodwatch_cmd().args(["config", "show"]).assert().success();
}

#[test]
fn test_config_path_honors_env() {
    floodwatch_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "floodwatch-cli-test-nonexistent/config.toml",
        ));
}

#[test]
fn test_config_profile_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
default_profile = "lab"

[profiles.lab]
api_url = "http://127.0.0.1:9/api"
token = "plaintext-token"
"#,
    )
    .unwrap();

    floodwatch_cmd()
        .env("FLOODWATCH_CONFIG", &path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[profiles.lab]")
                .and(predicate::str::contains("plaintext-token").not()),
        );

    floodwatch_cmd()
        .env("FLOODWATCH_CONFIG", &path)
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lab *"));
}

// ── Snapshot commands ───────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_devices_plain_lists_ids() {
    let server = backend().await;
    let output = run_against(&server, &["--output", "plain", "devices"]).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "AWLR-01\nAWLR-02\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_devices_offline_filter() {
    let server = backend().await;
    let output = run_against(&server, &["-o", "plain", "devices", "--status", "offline"]).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "AWLR-02\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_alerts_hide_offline_devices() {
    let server = backend().await;

    let output = run_against(&server, &["-o", "plain", "alerts"]).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "AWLR-01:flood\n");

    let output = run_against(&server, &["-o", "plain", "alerts", "--include-offline"]).await;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    assert!(stdout.contains("AWLR-02:rapid_rise"), "{stdout}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_device_detail_json() {
    let server = backend().await;
    let output = run_against(&server, &["-o", "json-compact", "device", "AWLR-01"]).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["device"]["id"], "AWLR-01");
    assert_eq!(body["active_alerts"][0]["alert_type"], "flood");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_device_is_not_found() {
    let server = backend().await;
    let output = run_against(&server, &["device", "AWLR-99"]).await;
    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_summary_counts() {
    let server = backend().await;
    let output = run_against(&server, &["-o", "plain", "summary"]).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    // total online offline visible-alerts
    assert_eq!(String::from_utf8_lossy(&output.stdout), "2 1 1 1\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejected_token_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let output = run_against(&server, &["devices"]).await;
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
}
