use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn console(temp: &TempDir) -> Command {
    let config = temp.path().join("config.toml");
    fs::write(
        &config,
        "[simulation]\nlatency_ms = 0\nid_prefix = \"test\"\nfail_wizards = [\"create-bucket\"]\n",
    )
    .unwrap();
    let mut cmd = Command::cargo_bin("console-wizard").unwrap();
    cmd.env_remove("RUST_LOG").arg("--config").arg(config);
    cmd
}

#[test]
fn list_shows_every_preset() {
    let temp = TempDir::new().unwrap();
    console(&temp)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("launch-instance"))
        .stdout(predicate::str::contains("add-identity-provider"));
}

#[test]
fn describe_prints_the_outline() {
    let temp = TempDir::new().unwrap();
    console(&temp)
        .args(["describe", "launch-instance"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3. Storage [optional]"))
        .stdout(predicate::str::contains("subnet (select): Subnet * <- vpc"));
}

#[test]
fn describe_unknown_wizard_fails() {
    let temp = TempDir::new().unwrap();
    console(&temp)
        .args(["describe", "create-database"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown wizard 'create-database'"));
}

#[test]
fn schema_is_json() {
    let temp = TempDir::new().unwrap();
    let output = console(&temp).arg("schema").output().unwrap();
    assert!(output.status.success());
    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(schema.is_object());
}

#[test]
fn run_creates_and_writes_the_snapshot() {
    let temp = TempDir::new().unwrap();
    let snapshot = temp.path().join("out/snapshot.json");
    let output = console(&temp)
        .args(["run", "launch-instance", "--json", "--answers"])
        .arg(fixture("launch-instance.answers.json"))
        .arg("--snapshot-out")
        .arg(&snapshot)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["status"], "created");
    assert!(
        result["resource_id"]
            .as_str()
            .is_some_and(|id| id.starts_with("test-"))
    );

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&snapshot).unwrap()).unwrap();
    assert_eq!(written["wizard_id"], "launch-instance");
    assert_eq!(written["fields"]["subnet"], "subnet-prod-a");
}

#[test]
fn run_prints_review_text() {
    let temp = TempDir::new().unwrap();
    console(&temp)
        .args(["run", "create-vpc", "--answers"])
        .arg(fixture("create-vpc.answers.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Review: Create VPC (create-vpc)"))
        .stdout(predicate::str::contains("Created test-"));
}

#[test]
fn failed_create_exits_non_zero() {
    let temp = TempDir::new().unwrap();
    console(&temp)
        .args(["run", "create-vpc", "--fail", "--answers"])
        .arg(fixture("create-vpc.answers.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("simulated_failure"));
}

#[test]
fn configured_failures_apply_per_wizard() {
    let temp = TempDir::new().unwrap();
    let answers = temp.path().join("bucket.json");
    fs::write(
        &answers,
        r#"{"schema":"console-wizard-run/v1","wizard":"create-bucket","fields":{"name":"media-archive","region":"eu-west-1"}}"#,
    )
    .unwrap();
    console(&temp)
        .args(["run", "create-bucket", "--answers"])
        .arg(&answers)
        .assert()
        .failure()
        .stderr(predicate::str::contains("create-bucket was not created"));
}

#[test]
fn answers_for_another_wizard_are_refused() {
    let temp = TempDir::new().unwrap();
    console(&temp)
        .args(["run", "create-bucket", "--answers"])
        .arg(fixture("create-vpc.answers.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("are for wizard 'create-vpc'"));
}

#[test]
fn answers_schema_tag_is_checked() {
    let temp = TempDir::new().unwrap();
    let answers = temp.path().join("answers.json");
    fs::write(
        &answers,
        r#"{"schema":"console-wizard-run/v0","wizard":"create-vpc","fields":{}}"#,
    )
    .unwrap();
    console(&temp)
        .args(["run", "create-vpc", "--answers"])
        .arg(&answers)
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected 'console-wizard-run/v1'"));
}
