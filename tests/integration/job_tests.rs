//! Integration tests for resumable catalog comparison jobs

use crate::common::{sample_data, MemorySource, TestFixture};
use dbcompare::checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
use dbcompare::job::{BatchRequest, JobStatus, JobTracker};
use dbcompare::schema::ColumnDescriptor;
use dbcompare::DbCompareError;

fn source() -> MemorySource {
    MemorySource::new("source")
        .with_table("A", sample_data::simple_table())
        .with_table("B", sample_data::products_v1())
        .with_table("C", sample_data::simple_table())
}

fn target() -> MemorySource {
    MemorySource::new("target")
        .with_table("A", sample_data::simple_table())
        .with_table("B", sample_data::products_v2())
        .with_table("C", sample_data::simple_table())
}

fn request(job_id: &str, offset: usize, limit: usize) -> BatchRequest {
    BatchRequest {
        job_id: job_id.to_string(),
        offset,
        limit,
    }
}

fn names(statuses: &[dbcompare::job::TableSchemaStatus]) -> Vec<&str> {
    statuses.iter().map(|s| s.table_name.as_str()).collect()
}

#[test]
fn test_paginated_job_completes_in_two_batches() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let (mut src, mut dst) = (source(), target());

    let first = tracker.apply_batch(&request("j", 0, 2), &mut src, &mut dst).unwrap();
    assert_eq!(first.status, JobStatus::InProgress);
    assert_eq!(first.progress, 66);
    assert_eq!(first.next_offset, Some(2));
    assert_eq!(first.processed_tables, 2);
    assert_eq!(first.total_tables, 3);
    assert_eq!(names(&first.batch), vec!["A", "B"]);
    assert!(first.results.is_none());

    assert!(!first.batch[0].has_differences);
    let b = &first.batch[1];
    assert!(b.has_differences);
    assert_eq!(b.column_diffs.len(), 1);
    assert_eq!(b.column_diffs[0].column_name, "name");
    assert_eq!(b.columns_only_in_target, vec!["stock"]);

    let second = tracker.apply_batch(&request("j", 2, 2), &mut src, &mut dst).unwrap();
    assert_eq!(second.status, JobStatus::Complete);
    assert_eq!(second.progress, 100);
    assert_eq!(second.next_offset, None);
    assert_eq!(names(&second.batch), vec!["C"]);
    assert_eq!(names(second.results.as_deref().unwrap()), vec!["A", "B", "C"]);

    let job = tracker.load_job("j").unwrap();
    assert!(job.is_complete());
    assert_eq!(job.tables_with_differences(), 1);
}

#[test]
fn test_failed_batch_leaves_checkpoint_untouched() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let mut src = source().failing_schema("B");
    let mut dst = target();

    let err = tracker
        .apply_batch(&request("j", 0, 2), &mut src, &mut dst)
        .unwrap_err();
    match err {
        DbCompareError::Comparison { table, .. } => assert_eq!(table, "B"),
        other => panic!("Expected comparison error, got {}", other),
    }

    // A was compared before B failed, but nothing of the batch was kept
    let job = store.load("j").unwrap().unwrap();
    assert_eq!(job.processed_offset, 0);
    assert!(job.accumulated_results.is_empty());

    src.heal();
    let retry = tracker.apply_batch(&request("j", 0, 2), &mut src, &mut dst).unwrap();
    assert_eq!(names(&retry.batch), vec!["A", "B"]);
    assert_eq!(store.load("j").unwrap().unwrap().processed_offset, 2);
}

#[test]
fn test_connection_failure_creates_no_job() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let mut src = source();
    let mut dst = target().failing_connect();

    let err = tracker
        .apply_batch(&request("j", 0, 2), &mut src, &mut dst)
        .unwrap_err();
    assert!(matches!(err, DbCompareError::Connection { ref name, .. } if name == "target"));
    assert!(store.load("j").unwrap().is_none());
}

#[test]
fn test_replayed_batch_does_not_recompare() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let (mut src, mut dst) = (source(), target());

    let first = tracker.apply_batch(&request("j", 0, 2), &mut src, &mut dst).unwrap();
    let calls = src.schema_calls.get();

    let replay = tracker.apply_batch(&request("j", 0, 2), &mut src, &mut dst).unwrap();
    assert_eq!(replay.batch, first.batch);
    assert_eq!(replay.next_offset, Some(2));
    assert_eq!(src.schema_calls.get(), calls);

    let job = store.load("j").unwrap().unwrap();
    assert_eq!(job.accumulated_results.len(), 2);
}

#[test]
fn test_partial_replay_is_clamped_to_processed_tables() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let (mut src, mut dst) = (source(), target());

    tracker.apply_batch(&request("j", 0, 2), &mut src, &mut dst).unwrap();
    let replay = tracker.apply_batch(&request("j", 1, 5), &mut src, &mut dst).unwrap();

    assert_eq!(names(&replay.batch), vec!["B"]);
    assert_eq!(replay.next_offset, Some(2));
    assert_eq!(replay.status, JobStatus::InProgress);
}

#[test]
fn test_offset_gap_is_rejected() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let (mut src, mut dst) = (source(), target());

    let err = tracker
        .apply_batch(&request("j", 2, 2), &mut src, &mut dst)
        .unwrap_err();
    assert!(matches!(err, DbCompareError::Validation { .. }));
    assert_eq!(store.load("j").unwrap().unwrap().processed_offset, 0);
}

#[test]
fn test_zero_limit_is_rejected() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let (mut src, mut dst) = (source(), target());

    let err = tracker
        .apply_batch(&request("j", 0, 0), &mut src, &mut dst)
        .unwrap_err();
    assert!(matches!(err, DbCompareError::Validation { .. }));
    assert!(store.load("j").unwrap().is_none());
}

#[test]
fn test_concurrent_caller_gets_job_busy() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let (mut src, mut dst) = (source(), target());

    let lease = store.acquire("j").unwrap();
    let err = tracker
        .apply_batch(&request("j", 0, 2), &mut src, &mut dst)
        .unwrap_err();
    assert!(matches!(err, DbCompareError::JobBusy { .. }));

    drop(lease);
    assert!(tracker.apply_batch(&request("j", 0, 2), &mut src, &mut dst).is_ok());
}

#[test]
fn test_empty_catalogs_complete_immediately() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let mut src = MemorySource::new("source");
    let mut dst = MemorySource::new("target");

    let response = tracker.apply_batch(&request("j", 0, 10), &mut src, &mut dst).unwrap();
    assert_eq!(response.status, JobStatus::Complete);
    assert_eq!(response.progress, 100);
    assert_eq!(response.total_tables, 0);
    assert_eq!(response.next_offset, None);
    assert_eq!(response.results, Some(Vec::new()));
}

#[test]
fn test_one_sided_tables_are_reported_without_schema_reads() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let mut src = MemorySource::new("source").with_table("legacy", sample_data::simple_table());
    let mut dst = MemorySource::new("target").with_table("shipments", sample_data::simple_table());

    let response = tracker.apply_batch(&request("j", 0, 10), &mut src, &mut dst).unwrap();
    assert_eq!(names(&response.batch), vec!["legacy", "shipments"]);

    let legacy = &response.batch[0];
    assert!(legacy.in_source && !legacy.in_target && legacy.has_differences);
    let shipments = &response.batch[1];
    assert!(!shipments.in_source && shipments.in_target && shipments.has_differences);

    assert_eq!(src.schema_calls.get(), 0);
    assert_eq!(dst.schema_calls.get(), 0);
}

#[test]
fn test_extra_column_alone_does_not_flag_table() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let mut extended = sample_data::simple_table();
    extended.push(ColumnDescriptor::new("extra", "varchar", None, None, None));
    let mut src = MemorySource::new("source").with_table("T", sample_data::simple_table());
    let mut dst = MemorySource::new("target").with_table("T", extended);

    let response = tracker.apply_batch(&request("j", 0, 1), &mut src, &mut dst).unwrap();
    let status = &response.batch[0];

    assert!(status.column_diffs.is_empty());
    assert_eq!(status.columns_only_in_target, vec!["extra"]);
    assert!(!status.has_differences);
    assert_eq!(tracker.load_job("j").unwrap().tables_with_differences(), 0);
}

#[test]
fn test_unbounded_limit_finishes_job() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let (mut src, mut dst) = (source(), target());

    tracker.apply_batch(&request("j", 0, 1), &mut src, &mut dst).unwrap();

    let replay = tracker
        .apply_batch(&request("j", 0, usize::MAX), &mut src, &mut dst)
        .unwrap();
    assert_eq!(names(&replay.batch), vec!["A"]);
    assert_eq!(replay.next_offset, Some(1));

    let last = tracker
        .apply_batch(&request("j", 1, usize::MAX), &mut src, &mut dst)
        .unwrap();
    assert_eq!(last.status, JobStatus::Complete);
    assert_eq!(last.progress, 100);
    assert_eq!(last.next_offset, None);
    assert_eq!(names(&last.batch), vec!["B", "C"]);
}

#[test]
fn test_run_to_completion_reports_every_batch() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let (mut src, mut dst) = (source(), target());

    let mut seen = Vec::new();
    let last = tracker
        .run_to_completion("j", 1, &mut src, &mut dst, |r| seen.push(r.progress))
        .unwrap();

    assert_eq!(seen, vec![33, 66, 100]);
    assert!(last.is_complete());
    assert_eq!(last.results.unwrap().len(), 3);
}

#[test]
fn test_run_to_completion_resumes_from_checkpoint() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let (mut src, mut dst) = (source(), target());

    tracker.apply_batch(&request("j", 0, 2), &mut src, &mut dst).unwrap();

    let mut batches = 0;
    let last = tracker
        .run_to_completion("j", 10, &mut src, &mut dst, |_| batches += 1)
        .unwrap();
    assert_eq!(batches, 1);
    assert_eq!(names(&last.batch), vec!["C"]);
}

#[test]
fn test_respond_turns_errors_into_error_status() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let (mut src, mut dst) = (source(), target());

    tracker.apply_batch(&request("j", 0, 1), &mut src, &mut dst).unwrap();
    let response = tracker.respond(&request("j", 3, 1), &mut src, &mut dst);

    assert_eq!(response.status, JobStatus::Error);
    assert!(response.message.unwrap().contains("ahead"));
    assert_eq!(response.processed_tables, 1);
    assert_eq!(response.progress, 33);
    assert_eq!(response.next_offset, Some(1));
}

#[test]
fn test_resume_with_other_connections_is_rejected() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let (mut src, mut dst) = (source(), target());
    tracker.apply_batch(&request("j", 0, 1), &mut src, &mut dst).unwrap();

    let mut other = MemorySource::new("elsewhere");
    let err = tracker
        .apply_batch(&request("j", 1, 1), &mut other, &mut dst)
        .unwrap_err();
    assert!(matches!(err, DbCompareError::Validation { .. }));
}

#[test]
fn test_results_and_cleanup() {
    let store = MemoryCheckpointStore::new();
    let tracker = JobTracker::new(&store);
    let (mut src, mut dst) = (source(), target());

    tracker.apply_batch(&request("j", 0, 2), &mut src, &mut dst).unwrap();
    assert!(matches!(
        tracker.results("j").unwrap_err(),
        DbCompareError::Validation { .. }
    ));

    tracker.apply_batch(&request("j", 2, 2), &mut src, &mut dst).unwrap();
    assert_eq!(tracker.results("j").unwrap().len(), 3);
    assert_eq!(tracker.list_jobs().unwrap().len(), 1);

    tracker.cleanup("j").unwrap();
    assert!(tracker.load_job("j").unwrap_err().is_not_found());
    assert!(tracker.cleanup("j").unwrap_err().is_not_found());
}

#[test]
fn test_file_checkpoint_survives_new_tracker() {
    let fixture = TestFixture::new().unwrap();
    let (mut src, mut dst) = (source(), target());

    {
        let store = FileCheckpointStore::new(fixture.workspace.jobs_dir.clone());
        let tracker = JobTracker::new(&store);
        tracker.apply_batch(&request("nightly", 0, 2), &mut src, &mut dst).unwrap();
    }
    assert!(fixture.job_path("nightly").exists());
    assert!(!fixture.workspace.jobs_dir.join("nightly.lock").exists());

    let store = FileCheckpointStore::new(fixture.workspace.jobs_dir.clone());
    let tracker = JobTracker::new(&store);
    let response = tracker.apply_batch(&request("nightly", 2, 2), &mut src, &mut dst).unwrap();
    assert!(response.is_complete());
    assert_eq!(response.results.unwrap().len(), 3);
}
