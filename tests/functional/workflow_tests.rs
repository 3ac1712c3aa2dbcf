//! End-to-end CLI workflows over DuckDB files

use crate::common::{sample_data, CliTestRunner};
use dbcompare::checkpoint::{CheckpointStore, FileCheckpointStore};
use std::fs;

fn runner_with_databases() -> CliTestRunner {
    let runner = CliTestRunner::new().unwrap();
    runner.add_duckdb_connection("prod", sample_data::SOURCE_DB);
    runner.add_duckdb_connection("staging", sample_data::TARGET_DB);
    runner
}

fn jobs(runner: &CliTestRunner) -> FileCheckpointStore {
    FileCheckpointStore::new(runner.fixture().workspace.jobs_dir.clone())
}

#[test]
fn test_schema_command_removes_job_by_default() {
    let runner = runner_with_databases();

    runner.expect_success(&["schema", "prod", "staging", "--batch-size", "1"]);
    assert!(jobs(&runner).list().unwrap().is_empty());
}

#[test]
fn test_schema_command_keeps_named_job() {
    let runner = runner_with_databases();

    runner.expect_success(&[
        "schema",
        "prod",
        "staging",
        "--job-id",
        "nightly",
        "--format",
        "json",
        "--keep-job",
    ]);

    let job = jobs(&runner).load("nightly").unwrap().unwrap();
    assert!(job.is_complete());
    assert_eq!(job.total_tables, 4);
    assert_eq!(job.tables_with_differences(), 3);

    runner.expect_success(&["results", "--job-id", "nightly"]);
    runner.expect_success(&["results", "--job-id", "nightly", "--format", "json"]);
    runner.expect_success(&["jobs"]);
    runner.expect_success(&["jobs", "--format", "json"]);

    runner.expect_success(&["cleanup", "--job-id", "nightly"]);
    assert!(!runner.fixture().job_path("nightly").exists());
}

#[test]
fn test_batch_command_advances_job() {
    let runner = runner_with_databases();

    runner.expect_success(&[
        "batch", "prod", "staging", "--job-id", "paged", "--offset", "0", "--limit", "3",
    ]);
    let job = jobs(&runner).load("paged").unwrap().unwrap();
    assert_eq!(job.processed_offset, 3);
    assert!(!job.is_complete());

    let err = runner.expect_failure(&["results", "--job-id", "paged"]);
    assert!(err.to_string().contains("not complete"));

    runner.expect_success(&[
        "batch", "prod", "staging", "--job-id", "paged", "--offset", "3", "--limit", "3",
    ]);
    assert!(jobs(&runner).load("paged").unwrap().unwrap().is_complete());
}

#[test]
fn test_batch_command_reports_errors_in_response() {
    let runner = runner_with_databases();

    // An offset past the processed tables answers with an error status
    runner.expect_success(&[
        "batch", "prod", "staging", "--job-id", "gap", "--offset", "2", "--limit", "1",
    ]);
    let job = jobs(&runner).load("gap").unwrap().unwrap();
    assert_eq!(job.processed_offset, 0);
}

#[test]
fn test_resume_after_partial_run() {
    let runner = runner_with_databases();

    runner.expect_success(&[
        "batch", "prod", "staging", "--job-id", "resume", "--limit", "1",
    ]);
    runner.expect_success(&[
        "schema", "prod", "staging", "--job-id", "resume", "--keep-job",
    ]);

    let job = jobs(&runner).load("resume").unwrap().unwrap();
    assert!(job.is_complete());
    assert_eq!(job.accumulated_results.len(), 4);
}

#[test]
fn test_cleanup_force_breaks_stale_lock() {
    let runner = runner_with_databases();
    runner.expect_success(&[
        "schema", "prod", "staging", "--job-id", "stale", "--keep-job",
    ]);

    let lock = runner.fixture().workspace.jobs_dir.join("stale.lock");
    fs::write(&lock, "99999 2024-01-01T00:00:00Z").unwrap();

    let err = runner.expect_failure(&["cleanup", "--job-id", "stale"]);
    assert!(err.to_string().contains("already being advanced"));

    runner.expect_success(&["cleanup", "--job-id", "stale", "--force"]);
    assert!(!lock.exists());
    assert!(!runner.fixture().job_path("stale").exists());
}

#[test]
fn test_compare_and_script_commands() {
    let runner = runner_with_databases();

    runner.expect_success(&["compare", "prod", "staging", "--table", "orders"]);
    runner.expect_success(&[
        "compare", "prod", "staging", "--table", "orders", "--data", "--format", "json",
    ]);
    runner.expect_success(&[
        "compare", "prod", "staging", "--table", "orders", "--columns", "id,total", "--data",
        "--limit", "1",
    ]);
    runner.expect_success(&["script", "prod", "staging", "--table", "orders"]);
    runner.expect_success(&[
        "script", "prod", "staging", "--table", "customers", "--format", "json",
    ]);
    runner.expect_success(&["status"]);
}

#[test]
fn test_compare_missing_table_fails() {
    let runner = runner_with_databases();
    let err = runner.expect_failure(&["compare", "prod", "staging", "--table", "shipments"]);
    assert!(err.is_not_found());
}

#[test]
fn test_invalid_output_format() {
    let runner = runner_with_databases();
    let err = runner.expect_failure(&["jobs", "--format", "xml"]);
    assert!(err.to_string().contains("Invalid output format"));
}
