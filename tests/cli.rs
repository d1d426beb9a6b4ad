mod common;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::str::contains;
use schema_managed::{Schema, Version};

const SCHEMA_V1: &str = r#"version: 1.0.0
columns:
  - name: a
    dtype: float
  - name: b
    dtype: int
    required: false
"#;

const SCHEMA_V1_1: &str = r#"version: 1.1.0
columns:
  - name: a
    dtype: float
  - name: b
    dtype: int
    min: 0
    max: 10
"#;

fn schema_managed() -> Command {
    Command::cargo_bin("schema-managed").expect("binary exists")
}

#[test]
fn validate_accepts_conforming_files() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("v1.yaml", SCHEMA_V1);
    let first = workspace.write("first.csv", "a,b\n0.1,1\n0.2,2\n0.3,3\n");
    let second = workspace.write("second.tsv", "a\tb\n1.5\t7\n");

    schema_managed()
        .args(["validate", "--schema"])
        .arg(&schema)
        .arg("-i")
        .arg(&first)
        .arg("-i")
        .arg(&second)
        .assert()
        .success();
}

#[test]
fn validate_fails_when_bounds_are_violated() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("v1_1.yaml", SCHEMA_V1_1);
    let data = workspace.write("data.csv", "a,b\n0.1,11\n");

    schema_managed()
        .args(["validate", "--all", "--schema"])
        .arg(&schema)
        .arg("-i")
        .arg(&data)
        .assert()
        .failure()
        .stderr(contains("1 of 1 file(s) do not match schema 1.1.0"));
}

#[test]
fn validate_reads_stdin() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("v1.yaml", SCHEMA_V1);

    schema_managed()
        .args(["validate", "-i", "-", "--schema"])
        .arg(&schema)
        .write_stdin("a,b\n0.5,4\n")
        .assert()
        .success();
}

#[test]
fn diff_prints_breaking_changes_and_fails() {
    let workspace = TestWorkspace::new();
    let previous = workspace.write("v1.yaml", SCHEMA_V1);
    let current = workspace.write("v1_1.yaml", SCHEMA_V1_1);

    schema_managed()
        .args(["diff", "--current"])
        .arg(&current)
        .arg("--previous")
        .arg(&previous)
        .assert()
        .failure()
        .stdout(contains("compatible: no"))
        .stdout(contains("breaking      Column 'b' became required"))
        .stderr(contains("Schema 1.1.0 is not backward compatible with 1.0.0"));
}

#[test]
fn diff_json_reports_compatible_change() {
    let workspace = TestWorkspace::new();
    let previous = workspace.write("v1_1.yaml", SCHEMA_V1_1);
    let relaxed = SCHEMA_V1_1.replace("1.1.0", "1.2.0").replace("    max: 10\n", "");
    let current = workspace.write("v1_2.yaml", &relaxed);

    schema_managed()
        .args(["diff", "--json", "--current"])
        .arg(&current)
        .arg("--previous")
        .arg(&previous)
        .assert()
        .success()
        .stdout(contains("\"compatible\": true"));
}

#[test]
fn bump_writes_new_version_to_output() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("v1.yaml", SCHEMA_V1);
    let output = workspace.path().join("v2.json");

    schema_managed()
        .args(["bump", "--part", "major", "--schema"])
        .arg(&schema)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    let bumped = Schema::load(&output).expect("bumped schema loads");
    assert_eq!(bumped.version(), Version::new(2, 0, 0));
    assert_eq!(bumped.column_names(), vec!["a", "b"]);
    let original = Schema::load(&schema).expect("original schema loads");
    assert_eq!(original.version(), Version::new(1, 0, 0));
}

#[test]
fn bump_past_the_largest_component_fails_cleanly() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write(
        "top.yaml",
        &SCHEMA_V1.replace("1.0.0", "18446744073709551615.0.0"),
    );

    schema_managed()
        .args(["bump", "--part", "major", "--schema"])
        .arg(&schema)
        .assert()
        .failure()
        .stderr(contains("Cannot bump the major component"));
    let unchanged = Schema::load(&schema).expect("schema still loads");
    assert_eq!(unchanged.version(), Version::new(u64::MAX, 0, 0));
}

#[test]
fn migrate_writes_transformed_csv_and_validates_target() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("input.csv", "a\n1.5\n2.0\n");
    let migrations = workspace.write(
        "migrations.json",
        r#"{"migrations": [
            {"from": "1.0.0", "to": "1.1.0", "operations": [
                {"op": "add_column", "name": "b", "value": 3}
            ]}
        ]}"#,
    );
    let schema = workspace.write("v1_1.yaml", SCHEMA_V1_1);
    let output = workspace.path().join("output.csv");

    schema_managed()
        .args(["migrate", "--from", "1.0.0", "--to", "1.1.0", "-i"])
        .arg(&input)
        .arg("-m")
        .arg(&migrations)
        .arg("--schema")
        .arg(&schema)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    assert_eq!(workspace.read("output.csv"), "a,b\n1.5,3\n2.0,3\n");
}

#[test]
fn migrate_without_path_fails() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("input.csv", "a\n1.5\n");
    let migrations = workspace.write("migrations.yaml", "migrations: []\n");

    schema_managed()
        .args(["migrate", "--from", "1.0.0", "--to", "2.0.0", "-i"])
        .arg(&input)
        .arg("-m")
        .arg(&migrations)
        .assert()
        .failure()
        .stderr(contains("Migrating"))
        .stderr(contains("No migration step registered from 1.0.0 towards 2.0.0"));
}

#[test]
fn migrate_reports_the_violated_constraint() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("input.csv", "a\n1.5\n");
    let migrations = workspace.write(
        "migrations.yaml",
        r#"migrations:
  - from: 1.0.0
    to: 1.1.0
    operations:
      - op: add_column
        name: b
        value: 99
"#,
    );
    let schema = workspace.write("v1_1.yaml", SCHEMA_V1_1);
    let output = workspace.path().join("output.csv");

    schema_managed()
        .args(["migrate", "--from", "1.0.0", "--to", "1.1.0", "-i"])
        .arg(&input)
        .arg("-m")
        .arg(&migrations)
        .arg("--schema")
        .arg(&schema)
        .arg("-o")
        .arg(&output)
        .assert()
        .failure()
        .stderr(contains("Validating migrated data against"))
        .stderr(contains("Column 'b' has values above maximum 10"));
    assert!(!output.exists());
}

#[test]
fn migrate_rejects_malformed_versions() {
    schema_managed()
        .args(["migrate", "--from", "1.0", "--to", "2.0.0", "-i", "x.csv", "-m", "m.yaml"])
        .assert()
        .failure()
        .stderr(contains("Invalid schema version '1.0'"));
}

#[test]
fn record_appends_and_history_lists_entries() {
    let workspace = TestWorkspace::new();
    let v1 = workspace.write("v1.yaml", SCHEMA_V1);
    let v1_1 = workspace.write("v1_1.yaml", SCHEMA_V1_1);
    let log = workspace.path().join("history.json");

    schema_managed()
        .args(["record", "--schema"])
        .arg(&v1)
        .arg("--log")
        .arg(&log)
        .assert()
        .success();
    schema_managed()
        .args(["record", "-d", "b required", "--schema"])
        .arg(&v1_1)
        .arg("--log")
        .arg(&log)
        .assert()
        .success();

    schema_managed()
        .args(["history", "--log"])
        .arg(&log)
        .assert()
        .success()
        .stdout(contains("1\t1.0.0\t2 column(s)\n"))
        .stdout(contains("2\t1.1.0\t2 column(s)\tb required\n"));
}
