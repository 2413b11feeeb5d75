use std::path::Path;

use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::tempdir;

fn binary_command() -> Command {
    let mut command = Command::new(assert_cmd::cargo::cargo_bin!("tau-slack-tally"));
    command
        .env_remove("TAU_SLACK_API_TOKEN")
        .env("RUST_LOG", "warn");
    command
}

fn tally_command(base_url: &str, root: &Path) -> Command {
    let mut command = binary_command();
    command
        .arg("--slack-api-base")
        .arg(base_url)
        .arg("--cache-dir")
        .arg(root.join("channels"))
        .arg("--report-path")
        .arg(root.join("report.json"))
        .arg("--request-pacing-ms")
        .arg("0")
        .env("TAU_SLACK_API_TOKEN", "xoxb-cli");
    command
}

#[test]
fn missing_token_fails_with_usage_error() {
    binary_command()
        .assert()
        .failure()
        .stderr(predicate::str::contains("--slack-api-token"));
}

#[test]
fn full_run_writes_report_and_channel_cache() {
    let server = MockServer::start();
    let temp = tempdir().expect("tempdir");
    server.mock(|when, then| {
        when.method(POST)
            .path("/conversations.list")
            .body_includes("token=xoxb-cli");
        then.status(200).json_body(json!({
            "ok": true,
            "channels": [{"id": "C1", "name": "general", "num_members": 4}]
        }));
    });
    let history = server.mock(|when, then| {
        when.method(POST)
            .path("/conversations.history")
            .body("token=xoxb-cli&channel=C1&limit=1000");
        then.status(200).json_body(json!({
            "ok": true,
            "has_more": false,
            "messages": [
                {"user": "U2", "ts": "1700000002.000100"},
                {"user": "U1", "ts": "1700000001.000100"},
                {"user": "U2", "ts": "1700000003.000100"}
            ]
        }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/users.list");
        then.status(200).json_body(json!({
            "ok": true,
            "members": [{"id": "U2", "real_name": "Grace Hopper"}]
        }));
    });

    tally_command(&server.base_url(), temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("fetched=1"))
        .stdout(predicate::str::contains("cache_write_failures=0"));
    assert_eq!(history.calls(), 1);

    let report: Value = serde_json::from_str(
        &std::fs::read_to_string(temp.path().join("report.json")).expect("read report"),
    )
    .expect("report json");
    assert_eq!(report[0]["user_id"], "U2");
    assert_eq!(report[0]["count"], 2);
    assert_eq!(report[0]["user"]["name"], "Grace Hopper");
    assert_eq!(report[1]["user_id"], "U1");
    assert_eq!(report[1]["user"], Value::Null);

    let cache: Value = serde_json::from_str(
        &std::fs::read_to_string(temp.path().join("channels/C1.json")).expect("read cache"),
    )
    .expect("cache json");
    let timestamps = cache["messages"]
        .as_array()
        .expect("messages array")
        .iter()
        .filter_map(|message| message["ts"].as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        timestamps,
        vec!["1700000001.000100", "1700000002.000100", "1700000003.000100"]
    );
}

#[test]
fn channel_directory_failure_exits_non_zero() {
    let server = MockServer::start();
    let temp = tempdir().expect("tempdir");
    server.mock(|when, then| {
        when.method(POST).path("/conversations.list");
        then.status(503).body("maintenance");
    });

    tally_command(&server.base_url(), temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to list slack channels"));
    assert!(!temp.path().join("report.json").exists());
}
