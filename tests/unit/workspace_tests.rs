//! Unit tests for workspace management

use crate::common::TestFixture;
use dbcompare::workspace::{validate_job_id, write_atomic};
use dbcompare::DbCompareWorkspace;
use std::fs;

#[test]
fn test_workspace_layout() {
    let fixture = TestFixture::new().unwrap();
    let workspace = &fixture.workspace;

    assert_eq!(workspace.dbcompare_dir, fixture.root().join(".dbcompare"));
    assert_eq!(workspace.jobs_dir, fixture.root().join(".dbcompare").join("jobs"));
    assert_eq!(
        workspace.connections_path(),
        fixture.root().join(".dbcompare").join("connections.json")
    );
}

#[test]
fn test_find_existing_workspace_from_subdirectory() {
    let fixture = TestFixture::new().unwrap();
    let nested = fixture.root().join("a").join("b");
    fs::create_dir_all(&nested).unwrap();

    let found = DbCompareWorkspace::find_or_create(Some(&nested)).unwrap();
    assert_eq!(found.root, fixture.root());
    assert!(!nested.join(".dbcompare").exists());
}

#[test]
fn test_find_or_create_initializes_when_missing() {
    let fixture = TestFixture::new_empty().unwrap();
    assert!(!fixture.workspace.dbcompare_dir.exists());

    let workspace = DbCompareWorkspace::find_or_create(Some(fixture.root())).unwrap();
    assert!(workspace.config_path().exists());
    assert!(workspace.jobs_dir.exists());
}

#[test]
fn test_invalid_config_is_reported() {
    let fixture = TestFixture::new().unwrap();
    fs::write(fixture.workspace.config_path(), "{not json").unwrap();

    let err = fixture.workspace.load_config().unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

#[test]
fn test_config_keeps_custom_values() {
    let fixture = TestFixture::new().unwrap();
    fs::write(
        fixture.workspace.config_path(),
        r#"{"version": "1.0.0", "created": "2024-01-01T00:00:00Z", "default_batch_size": 3}"#,
    )
    .unwrap();

    let config = fixture.workspace.load_config().unwrap();
    assert_eq!(config.default_batch_size, 3);
    assert_eq!(config.default_row_limit, dbcompare::DEFAULT_ROW_LIMIT);
}

#[test]
fn test_stats_count_jobs() {
    let fixture = TestFixture::new().unwrap();
    fs::write(fixture.job_path("one"), "{}").unwrap();
    fs::write(fixture.workspace.jobs_dir.join("one.lock"), "1").unwrap();

    let stats = fixture.workspace.stats().unwrap();
    assert_eq!(stats.job_count, 1);
    assert_eq!(stats.total_job_size, 2);
    assert!(!stats.has_connections);
}

#[test]
fn test_write_atomic_replaces_content() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture.root().join("state.json");

    write_atomic(&path, b"first").unwrap();
    write_atomic(&path, b"second").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    let leftovers: Vec<_> = fs::read_dir(fixture.root())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_job_id_validation() {
    assert!(validate_job_id("2024-nightly_run").is_ok());
    assert!(validate_job_id("has space").is_err());
    assert!(validate_job_id("a/b").is_err());
    assert!(validate_job_id(&"x".repeat(129)).is_err());
}
