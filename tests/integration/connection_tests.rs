//! Integration tests for saved connections

use crate::common::{sample_data, CliTestRunner};
use dbcompare::connections::FileConnectionStore;
use dbcompare::source::{resolve_connection, ConnectionStore, Driver};

fn store(runner: &CliTestRunner) -> FileConnectionStore {
    FileConnectionStore::new(runner.fixture().workspace.connections_path())
}

#[test]
fn test_connection_add_and_list() {
    let runner = CliTestRunner::new().unwrap();

    runner.expect_success(&["connection", "add", "local", "--database", "local.duckdb"]);
    runner.expect_success(&[
        "connection",
        "add",
        "pg",
        "--driver",
        "postgresql",
        "--server",
        "db.internal",
        "--database",
        "sales",
        "--username",
        "reporter",
        "--password",
        "hunter2",
    ]);
    runner.expect_success(&["connection", "list"]);
    runner.expect_success(&["connection", "list", "--format", "json"]);

    let saved = store(&runner).list().unwrap();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0].info.name, "local");
    assert_eq!(saved[0].info.driver, Driver::DuckDb);
    assert_eq!(saved[1].info.driver, Driver::Postgres);
    assert_eq!(saved[1].info.username, "reporter");
}

#[test]
fn test_network_driver_requires_server() {
    let runner = CliTestRunner::new().unwrap();
    let err = runner.expect_failure(&[
        "connection", "add", "pg", "--driver", "postgres", "--database", "sales",
    ]);
    assert!(err.to_string().contains("--server"));
}

#[test]
fn test_unknown_driver_rejected() {
    let runner = CliTestRunner::new().unwrap();
    let err = runner.expect_failure(&[
        "connection", "add", "ora", "--driver", "oracle", "--database", "x",
    ]);
    assert!(err.to_string().contains("Unsupported driver"));
}

#[test]
fn test_duplicate_connection_needs_replace() {
    let runner = CliTestRunner::new().unwrap();

    runner.expect_success(&["connection", "add", "local", "--database", "a.duckdb"]);
    runner.expect_failure(&["connection", "add", "local", "--database", "b.duckdb"]);
    runner.expect_success(&[
        "connection", "add", "local", "--database", "b.duckdb", "--replace",
    ]);

    let info = resolve_connection(&store(&runner), "local").unwrap();
    assert_eq!(info.database, "b.duckdb");
}

#[test]
fn test_connection_remove() {
    let runner = CliTestRunner::new().unwrap();

    runner.expect_success(&["connection", "add", "local", "--database", "a.duckdb"]);
    runner.expect_success(&["connection", "remove", "local"]);
    assert!(store(&runner).get_connection_by_name("local").unwrap().is_none());

    let err = runner.expect_failure(&["connection", "remove", "local"]);
    assert!(err.is_not_found());
}

#[test]
fn test_connection_test_command() {
    let runner = CliTestRunner::new().unwrap();
    runner.add_duckdb_connection("prod", sample_data::SOURCE_DB);

    runner.expect_success(&["connection", "test", "prod"]);

    let saved = store(&runner).list().unwrap();
    assert!(saved[0].last_used_at.is_some());
}

#[test]
fn test_connection_test_missing_file() {
    let runner = CliTestRunner::new().unwrap();
    runner.expect_success(&["connection", "add", "ghost", "--database", "missing.duckdb"]);

    let err = runner.expect_failure(&["connection", "test", "ghost"]);
    assert!(err.to_string().contains("Failed to connect to 'ghost'"));
}

#[test]
fn test_unknown_connection_is_not_found() {
    let runner = CliTestRunner::new().unwrap();
    let err = runner.expect_failure(&["connection", "test", "nowhere"]);
    assert!(err.is_not_found());
}
