//! One-shot CLI commands.

use serde_json::Value;

use crate::common::{get_free_port, panel_command, spawn_mock_database, write_fixture};

#[tokio::test]
async fn query_command_prints_the_result() {
    let database = spawn_mock_database().await;
    let fixture = write_fixture("cli-query", database.addr, false);

    let output = panel_command(&fixture, &["query", "RETURN 1;"])
        .output()
        .await
        .expect("failed to run panel");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let printed: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(printed["result"][0]["result"]["query"], "RETURN 1;");
}

#[tokio::test]
async fn container_inspect_without_runtime_is_unknown() {
    let database = spawn_mock_database().await;
    let fixture = write_fixture("cli-inspect", database.addr, false);

    let output = panel_command(&fixture, &["container", "inspect"])
        .output()
        .await
        .expect("failed to run panel");

    assert!(output.status.success(), "inspect never fails");
    let printed: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(printed["state"], "unknown");
}

#[tokio::test]
async fn container_start_without_runtime_fails() {
    let database = spawn_mock_database().await;
    let fixture = write_fixture("cli-start", database.addr, false);

    let output = panel_command(&fixture, &["container", "start"])
        .output()
        .await
        .expect("failed to run panel");

    assert!(!output.status.success(), "start must fail without a runtime");
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("unavailable"),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[tokio::test]
async fn missing_config_file_is_an_error() {
    let database = spawn_mock_database().await;
    let mut fixture = write_fixture("cli-missing", database.addr, false);
    fixture.config_path = fixture
        .dir
        .join(format!("does-not-exist-{}.toml", get_free_port()));

    let output = panel_command(&fixture, &["container", "inspect"])
        .output()
        .await
        .expect("failed to run panel");

    assert!(!output.status.success(), "missing config must fail");
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("Config file not found"),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}
