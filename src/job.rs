//! Resumable, batch-at-a-time comparison of two whole catalogs
//!
//! A job is addressed by id and advanced by stateless calls carrying an
//! `offset` and a `limit`. The first call lists both catalogs and stores the
//! sorted union of table names; each call then compares the schemas of the
//! next slice of tables and appends the slice to the checkpoint in one write.
//! A failing call leaves the checkpoint exactly as it was, so it can simply be
//! retried.

use crate::checkpoint::CheckpointStore;
use crate::error::{DbCompareError, Result};
use crate::schema_compare::{compare_schema, ColumnDiff};
use crate::source::DataSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Schema comparison outcome for one table of the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchemaStatus {
    pub table_name: String,
    pub in_source: bool,
    pub in_target: bool,
    /// Empty unless the table exists on both sides
    pub column_diffs: Vec<ColumnDiff>,
    /// Reported for display only; `has_differences` follows `column_diffs`
    #[serde(default)]
    pub columns_only_in_source: Vec<String>,
    #[serde(default)]
    pub columns_only_in_target: Vec<String>,
    pub has_differences: bool,
}

impl TableSchemaStatus {
    /// Status for a table that exists on one side only
    pub fn one_sided(table_name: impl Into<String>, in_source: bool, in_target: bool) -> Self {
        Self {
            table_name: table_name.into(),
            in_source,
            in_target,
            column_diffs: Vec::new(),
            columns_only_in_source: Vec::new(),
            columns_only_in_target: Vec::new(),
            has_differences: true,
        }
    }
}

/// Checkpointed state of a catalog comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonJob {
    pub job_id: String,
    pub source_connection: String,
    pub target_connection: String,
    /// Sorted union of both catalogs, fixed when the job is created
    pub all_table_names: Vec<String>,
    pub source_tables: BTreeSet<String>,
    pub target_tables: BTreeSet<String>,
    pub total_tables: usize,
    pub processed_offset: usize,
    pub accumulated_results: Vec<TableSchemaStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ComparisonJob {
    pub fn new(
        job_id: impl Into<String>,
        source_connection: impl Into<String>,
        target_connection: impl Into<String>,
        source_tables: Vec<String>,
        target_tables: Vec<String>,
    ) -> Self {
        let source_tables: BTreeSet<String> = source_tables.into_iter().collect();
        let target_tables: BTreeSet<String> = target_tables.into_iter().collect();
        let all_table_names: Vec<String> =
            source_tables.union(&target_tables).cloned().collect();
        let now = Utc::now();

        Self {
            job_id: job_id.into(),
            source_connection: source_connection.into(),
            target_connection: target_connection.into(),
            total_tables: all_table_names.len(),
            all_table_names,
            source_tables,
            target_tables,
            processed_offset: 0,
            accumulated_results: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.processed_offset >= self.total_tables
    }

    pub fn progress(&self) -> u8 {
        progress_at(self.processed_offset, self.total_tables)
    }

    /// Number of processed tables with at least one difference
    pub fn tables_with_differences(&self) -> usize {
        self.accumulated_results
            .iter()
            .filter(|s| s.has_differences)
            .count()
    }
}

/// `floor(100 * end / total)`, with an empty catalog counting as done
fn progress_at(end: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((100 * end.min(total)) / total) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub job_id: String,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub processed_tables: usize,
    pub total_tables: usize,
    /// Statuses of the tables covered by this call
    pub batch: Vec<TableSchemaStatus>,
    /// Every accumulated status, present once the job is complete
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<TableSchemaStatus>>,
    pub next_offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BatchResponse {
    pub fn is_complete(&self) -> bool {
        self.status == JobStatus::Complete
    }

    fn for_slice(job: &ComparisonJob, end: usize, batch: Vec<TableSchemaStatus>) -> Self {
        let complete = end >= job.total_tables;
        Self {
            job_id: job.job_id.clone(),
            status: if complete {
                JobStatus::Complete
            } else {
                JobStatus::InProgress
            },
            progress: progress_at(end, job.total_tables),
            processed_tables: end,
            total_tables: job.total_tables,
            batch,
            results: complete.then(|| job.accumulated_results.clone()),
            next_offset: if complete { None } else { Some(end) },
            message: None,
        }
    }

    fn error(job_id: &str, job: Option<&ComparisonJob>, message: String) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::Error,
            progress: job.map_or(0, ComparisonJob::progress),
            processed_tables: job.map_or(0, |j| j.processed_offset),
            total_tables: job.map_or(0, |j| j.total_tables),
            batch: Vec::new(),
            results: None,
            next_offset: job.filter(|j| !j.is_complete()).map(|j| j.processed_offset),
            message: Some(message),
        }
    }
}

/// Generate an id for a new job
pub fn new_job_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Drives comparison jobs against a checkpoint store
pub struct JobTracker<'a> {
    store: &'a dyn CheckpointStore,
}

impl<'a> JobTracker<'a> {
    pub fn new(store: &'a dyn CheckpointStore) -> Self {
        Self { store }
    }

    /// Apply one batch of a job, creating the job on its first call.
    ///
    /// `offset` must equal the job's processed offset to advance it. A smaller
    /// offset replays statuses already in the checkpoint without touching the
    /// sources; a larger one would skip tables and is rejected.
    pub fn apply_batch(
        &self,
        request: &BatchRequest,
        source: &mut dyn DataSource,
        target: &mut dyn DataSource,
    ) -> Result<BatchResponse> {
        if request.limit == 0 {
            return Err(DbCompareError::validation("Batch limit must be at least 1"));
        }

        let _lease = self.store.acquire(&request.job_id)?;

        let mut job = match self.store.load(&request.job_id)? {
            Some(job) => {
                check_sources(&job, source.name(), target.name())?;
                job
            }
            None => self.initialize(&request.job_id, source, target)?,
        };

        if request.offset > job.processed_offset {
            return Err(DbCompareError::validation(format!(
                "Offset {} is ahead of job '{}', which has processed {} of {} tables",
                request.offset, job.job_id, job.processed_offset, job.total_tables
            )));
        }

        if request.offset < job.processed_offset {
            let end = request
                .offset
                .saturating_add(request.limit)
                .min(job.processed_offset);
            log::debug!(
                "Replaying tables {}..{} of job '{}'",
                request.offset,
                end,
                job.job_id
            );
            let batch = job.accumulated_results[request.offset..end].to_vec();
            return Ok(BatchResponse::for_slice(&job, end, batch));
        }

        let end = request.offset.saturating_add(request.limit).min(job.total_tables);
        if request.offset >= end {
            return Ok(BatchResponse::for_slice(&job, end, Vec::new()));
        }

        source.connect()?;
        target.connect()?;

        let mut batch = Vec::with_capacity(end - request.offset);
        for table in &job.all_table_names[request.offset..end] {
            let status = compare_table(&job, table, &*source, &*target).map_err(|e| match e {
                e @ DbCompareError::Comparison { .. } => e,
                other => DbCompareError::comparison(table, other.to_string()),
            })?;
            batch.push(status);
        }

        job.accumulated_results.extend(batch.iter().cloned());
        job.processed_offset = end;
        job.updated_at = Utc::now();
        self.store.save(&job)?;

        log::info!(
            "Job '{}': {}/{} tables compared ({}%)",
            job.job_id,
            end,
            job.total_tables,
            job.progress()
        );

        Ok(BatchResponse::for_slice(&job, end, batch))
    }

    /// Like [`JobTracker::apply_batch`], but any failure becomes an error
    /// response instead of an `Err`
    pub fn respond(
        &self,
        request: &BatchRequest,
        source: &mut dyn DataSource,
        target: &mut dyn DataSource,
    ) -> BatchResponse {
        match self.apply_batch(request, source, target) {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Batch for job '{}' failed: {}", request.job_id, e);
                let job = self.store.load(&request.job_id).ok().flatten();
                BatchResponse::error(&request.job_id, job.as_ref(), e.to_string())
            }
        }
    }

    /// Keep applying batches from the job's current offset until it completes
    pub fn run_to_completion(
        &self,
        job_id: &str,
        batch_size: usize,
        source: &mut dyn DataSource,
        target: &mut dyn DataSource,
        mut on_batch: impl FnMut(&BatchResponse),
    ) -> Result<BatchResponse> {
        let mut offset = match self.store.load(job_id)? {
            Some(job) => job.processed_offset,
            None => 0,
        };

        loop {
            let request = BatchRequest {
                job_id: job_id.to_string(),
                offset,
                limit: batch_size,
            };
            let response = self.apply_batch(&request, source, target)?;
            on_batch(&response);

            match response.next_offset {
                Some(next) if !response.is_complete() => offset = next,
                _ => return Ok(response),
            }
        }
    }

    pub fn load_job(&self, job_id: &str) -> Result<ComparisonJob> {
        self.store
            .load(job_id)?
            .ok_or_else(|| DbCompareError::job_not_found(job_id))
    }

    /// Full results of a completed job
    pub fn results(&self, job_id: &str) -> Result<Vec<TableSchemaStatus>> {
        let job = self.load_job(job_id)?;
        if !job.is_complete() {
            return Err(DbCompareError::validation(format!(
                "Job '{}' is not complete ({} of {} tables processed)",
                job_id, job.processed_offset, job.total_tables
            )));
        }
        Ok(job.accumulated_results)
    }

    /// Delete a job's checkpoint
    pub fn cleanup(&self, job_id: &str) -> Result<()> {
        let _lease = self.store.acquire(job_id)?;
        if !self.store.delete(job_id)? {
            return Err(DbCompareError::job_not_found(job_id));
        }
        log::info!("Removed comparison job '{}'", job_id);
        Ok(())
    }

    pub fn list_jobs(&self) -> Result<Vec<ComparisonJob>> {
        let mut jobs = Vec::new();
        for id in self.store.list()? {
            if let Some(job) = self.store.load(&id)? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    fn initialize(
        &self,
        job_id: &str,
        source: &mut dyn DataSource,
        target: &mut dyn DataSource,
    ) -> Result<ComparisonJob> {
        source.connect()?;
        target.connect()?;

        let job = ComparisonJob::new(
            job_id,
            source.name(),
            target.name(),
            source.list_tables()?,
            target.list_tables()?,
        );
        self.store.save(&job)?;

        log::info!(
            "Started comparison job '{}' ({} -> {}): {} tables",
            job.job_id,
            job.source_connection,
            job.target_connection,
            job.total_tables
        );
        Ok(job)
    }
}

fn check_sources(job: &ComparisonJob, source: &str, target: &str) -> Result<()> {
    if job.source_connection != source || job.target_connection != target {
        return Err(DbCompareError::validation(format!(
            "Job '{}' compares '{}' to '{}', not '{}' to '{}'",
            job.job_id, job.source_connection, job.target_connection, source, target
        )));
    }
    Ok(())
}

fn compare_table(
    job: &ComparisonJob,
    table: &str,
    source: &dyn DataSource,
    target: &dyn DataSource,
) -> Result<TableSchemaStatus> {
    let in_source = job.source_tables.contains(table);
    let in_target = job.target_tables.contains(table);

    if !(in_source && in_target) {
        return Ok(TableSchemaStatus::one_sided(table, in_source, in_target));
    }

    log::debug!("Comparing schema of '{}'", table);
    let source_schema = source.get_schema(table)?;
    let target_schema = target.get_schema(table)?;
    let diff = compare_schema(&source_schema, &target_schema, None);

    Ok(TableSchemaStatus {
        table_name: table.to_string(),
        in_source,
        in_target,
        has_differences: !diff.differences.is_empty(),
        column_diffs: diff.differences,
        columns_only_in_source: diff.only_in_source,
        columns_only_in_target: diff.only_in_target,
    })
}
