//! Persistence of comparison job checkpoints
//!
//! A checkpoint is the whole [`ComparisonJob`], rewritten after every applied
//! batch. Stores also hand out a per-job lease so that only one caller at a
//! time can advance a given job.

use crate::error::{DbCompareError, Result};
use crate::job::ComparisonJob;
use crate::workspace::{validate_job_id, write_atomic};
use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use walkdir::WalkDir;

/// Exclusive right to advance one job, released on drop
pub struct JobLease<'a> {
    job_id: String,
    release: Option<Box<dyn FnOnce() + 'a>>,
}

impl<'a> JobLease<'a> {
    pub fn new(job_id: impl Into<String>, release: impl FnOnce() + 'a) -> Self {
        Self {
            job_id: job_id.into(),
            release: Some(Box::new(release)),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl Drop for JobLease<'_> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

pub trait CheckpointStore {
    fn load(&self, job_id: &str) -> Result<Option<ComparisonJob>>;

    /// Replace the stored checkpoint as a whole; a failed save leaves the
    /// previous checkpoint in place
    fn save(&self, job: &ComparisonJob) -> Result<()>;

    /// Returns false when there was nothing to delete
    fn delete(&self, job_id: &str) -> Result<bool>;

    /// Ids of all stored jobs, sorted
    fn list(&self) -> Result<Vec<String>>;

    /// Take the single-writer lease for a job, failing with
    /// [`DbCompareError::JobBusy`] while someone else holds it
    fn acquire(&self, job_id: &str) -> Result<JobLease<'_>>;
}

/// In-process store, used by tests and embedding callers
#[derive(Default)]
pub struct MemoryCheckpointStore {
    jobs: Mutex<HashMap<String, ComparisonJob>>,
    leases: Mutex<HashSet<String>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> DbCompareError {
    DbCompareError::workspace("checkpoint store lock poisoned")
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, job_id: &str) -> Result<Option<ComparisonJob>> {
        Ok(self.jobs.lock().map_err(poisoned)?.get(job_id).cloned())
    }

    fn save(&self, job: &ComparisonJob) -> Result<()> {
        self.jobs
            .lock()
            .map_err(poisoned)?
            .insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    fn delete(&self, job_id: &str) -> Result<bool> {
        Ok(self.jobs.lock().map_err(poisoned)?.remove(job_id).is_some())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.jobs.lock().map_err(poisoned)?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn acquire(&self, job_id: &str) -> Result<JobLease<'_>> {
        if !self.leases.lock().map_err(poisoned)?.insert(job_id.to_string()) {
            return Err(DbCompareError::JobBusy {
                job_id: job_id.to_string(),
            });
        }

        let id = job_id.to_string();
        Ok(JobLease::new(job_id, move || {
            if let Ok(mut leases) = self.leases.lock() {
                leases.remove(&id);
            }
        }))
    }
}

/// Store writing one `<job_id>.json` per job into a directory.
///
/// Leases are `<job_id>.lock` files created exclusively. A process that dies
/// while holding one leaves the lock behind; [`FileCheckpointStore::break_lease`]
/// removes it.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn job_path(&self, job_id: &str) -> Result<PathBuf> {
        validate_job_id(job_id)?;
        Ok(self.dir.join(format!("{}.json", job_id)))
    }

    fn lock_path(&self, job_id: &str) -> Result<PathBuf> {
        validate_job_id(job_id)?;
        Ok(self.dir.join(format!("{}.lock", job_id)))
    }

    /// Remove a lease left behind by a caller that never released it
    pub fn break_lease(&self, job_id: &str) -> Result<bool> {
        let path = self.lock_path(job_id)?;
        if path.exists() {
            fs::remove_file(&path)?;
            log::warn!("Removed stale lock for job '{}'", job_id);
            return Ok(true);
        }
        Ok(false)
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, job_id: &str) -> Result<Option<ComparisonJob>> {
        let path = self.job_path(job_id)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let job = serde_json::from_str(&content).map_err(|e| {
            DbCompareError::workspace(format!(
                "Corrupt checkpoint '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(Some(job))
    }

    fn save(&self, job: &ComparisonJob) -> Result<()> {
        let path = self.job_path(&job.job_id)?;
        fs::create_dir_all(&self.dir)?;
        write_atomic(&path, serde_json::to_string_pretty(job)?.as_bytes())
    }

    fn delete(&self, job_id: &str) -> Result<bool> {
        let path = self.job_path(job_id)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        if !self.dir.exists() {
            return Ok(ids);
        }

        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                // skips in-flight temp files, which start with a dot
                if validate_job_id(stem).is_ok() {
                    ids.push(stem.to_string());
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    fn acquire(&self, job_id: &str) -> Result<JobLease<'_>> {
        let path = self.lock_path(job_id)?;
        fs::create_dir_all(&self.dir)?;

        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(DbCompareError::JobBusy {
                    job_id: job_id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        record_owner(lock_file_lease(job_id, path), file)
    }
}

/// Lease that removes its lock file when dropped
fn lock_file_lease<'a>(job_id: &str, path: PathBuf) -> JobLease<'a> {
    JobLease::new(job_id, move || {
        if let Err(e) = fs::remove_file(&path) {
            log::warn!("Failed to release lock {}: {}", path.display(), e);
        }
    })
}

/// Write the holder's pid and start time into the lock. A failed write drops
/// the lease, which removes the lock again.
fn record_owner<'a>(lease: JobLease<'a>, mut out: impl Write) -> Result<JobLease<'a>> {
    writeln!(out, "{} {}", std::process::id(), chrono::Utc::now().to_rfc3339())?;
    Ok(lease)
}
