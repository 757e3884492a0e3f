mod setup;

use std::io::Write;

use predicates::boolean::PredicateBooleanExt;
use predicates::str::contains;
use setup::{DEFAULT_TIMEOUT, UNREACHABLE_PORT, make_cli};

fn json_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_help_lists_commands() {
    let mut cmd = make_cli();

    cmd.timeout(DEFAULT_TIMEOUT)
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("query").and(contains("execute")).and(contains("call")));
}

#[test]
/// A dataset that isn't tabular is rejected before connecting.
fn test_non_tabular_tmp_table() {
    let file = json_file("42");
    let mut cmd = make_cli();

    cmd.timeout(DEFAULT_TIMEOUT)
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(UNREACHABLE_PORT)
        .arg("query")
        .arg("SELECT * FROM tmp_table")
        .arg("--tmp-table")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(contains("Not a tabular dataset").and(contains("Failed to connect").not()));
}

#[test]
fn test_invalid_json_tmp_table() {
    let file = json_file("{not json");
    let mut cmd = make_cli();

    cmd.timeout(DEFAULT_TIMEOUT)
        .arg("query")
        .arg("SELECT * FROM tmp_table")
        .arg("--tmp-table")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(contains("failed to parse"));
}

#[test]
fn test_empty_host() {
    let mut cmd = make_cli();

    cmd.timeout(DEFAULT_TIMEOUT)
        .arg("--host")
        .arg("")
        .arg("query")
        .arg("SELECT 1")
        .assert()
        .failure()
        .stderr(contains("host must not be empty"));
}

#[test]
fn test_unknown_config_key() {
    let file = json_file(r#"{"hostname": "db.example.com"}"#);
    let mut cmd = make_cli();

    cmd.timeout(DEFAULT_TIMEOUT)
        .arg("--config")
        .arg(file.path())
        .arg("query")
        .arg("SELECT 1")
        .assert()
        .failure()
        .stderr(contains("Invalid configuration"));
}

#[test]
fn test_sql_required() {
    let mut cmd = make_cli();

    cmd.timeout(DEFAULT_TIMEOUT)
        .arg("query")
        .assert()
        .failure()
        .stderr(contains("either SQL or a file containing SQL is required"));
}

#[test]
/// Can't pass inline SQL and a file at the same time.
fn test_sql_and_file_conflict() {
    let mut cmd = make_cli();

    cmd.timeout(DEFAULT_TIMEOUT)
        .arg("execute")
        .arg("SELECT 1")
        .arg("--file")
        .arg("query.sql")
        .assert()
        .failure()
        .stderr(contains("cannot be used with"));
}

#[test]
fn test_invalid_procedure_name() {
    let mut cmd = make_cli();

    cmd.timeout(DEFAULT_TIMEOUT)
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(UNREACHABLE_PORT)
        .arg("call")
        .arg("a.b.c")
        .assert()
        .failure()
        .stderr(contains("invalid procedure name"));
}

#[test]
fn test_unreachable_server() {
    let mut cmd = make_cli();

    cmd.timeout(DEFAULT_TIMEOUT)
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(UNREACHABLE_PORT)
        .arg("query")
        .arg("SELECT 1")
        .assert()
        .failure()
        .stderr(contains("Failed to connect"));
}
