//! Workspace management for dbcompare

use crate::error::{DbCompareError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const WORKSPACE_DIR: &str = ".dbcompare";
const CONFIG_FILE: &str = "config.json";
const CONNECTIONS_FILE: &str = "connections.json";
const JOBS_DIR: &str = "jobs";

/// Manages the .dbcompare workspace directory
#[derive(Debug, Clone)]
pub struct DbCompareWorkspace {
    /// Project root directory (where .dbcompare/ lives)
    pub root: PathBuf,
    /// .dbcompare/ directory path
    pub dbcompare_dir: PathBuf,
    /// .dbcompare/jobs/ directory path, one checkpoint per comparison job
    pub jobs_dir: PathBuf,
}

/// Contents of `.dbcompare/config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub version: String,
    pub created: DateTime<Utc>,
    #[serde(default = "default_row_limit")]
    pub default_row_limit: usize,
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,
}

fn default_row_limit() -> usize {
    crate::DEFAULT_ROW_LIMIT
}

fn default_batch_size() -> usize {
    crate::DEFAULT_BATCH_SIZE
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            version: crate::FORMAT_VERSION.to_string(),
            created: Utc::now(),
            default_row_limit: crate::DEFAULT_ROW_LIMIT,
            default_batch_size: crate::DEFAULT_BATCH_SIZE,
        }
    }
}

impl DbCompareWorkspace {
    /// Find existing workspace or create a new one
    pub fn find_or_create(start_dir: Option<&Path>) -> Result<Self> {
        let current_dir = std::env::current_dir()?;
        let start = start_dir.unwrap_or(&current_dir);

        if let Some(workspace) = Self::find_existing(start)? {
            return Ok(workspace);
        }

        Self::create_new(start.to_path_buf())
    }

    /// Find existing .dbcompare workspace by walking up directory tree
    fn find_existing(start_dir: &Path) -> Result<Option<Self>> {
        let mut current = start_dir;

        loop {
            let dir = current.join(WORKSPACE_DIR);
            if dir.is_dir() {
                return Ok(Some(Self::from_root(current.to_path_buf())?));
            }

            // A git root is as far up as we look
            if current.join(".git").exists() {
                break;
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        Ok(None)
    }

    /// Create a new workspace in the specified root directory
    pub fn create_new(root: PathBuf) -> Result<Self> {
        let workspace = Self::from_root(root)?;

        fs::create_dir_all(&workspace.dbcompare_dir)?;
        fs::create_dir_all(&workspace.jobs_dir)?;

        workspace.create_config_with_force(false)?;
        workspace.ensure_gitignore()?;

        log::info!("Created dbcompare workspace at: {}", workspace.root.display());

        Ok(workspace)
    }

    /// Create workspace from root directory path
    pub fn from_root(root: PathBuf) -> Result<Self> {
        let dbcompare_dir = root.join(WORKSPACE_DIR);
        let jobs_dir = dbcompare_dir.join(JOBS_DIR);

        Ok(Self {
            root,
            dbcompare_dir,
            jobs_dir,
        })
    }

    pub fn config_path(&self) -> PathBuf {
        self.dbcompare_dir.join(CONFIG_FILE)
    }

    pub fn connections_path(&self) -> PathBuf {
        self.dbcompare_dir.join(CONNECTIONS_FILE)
    }

    /// Load the workspace configuration, falling back to defaults when absent
    pub fn load_config(&self) -> Result<WorkspaceConfig> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(WorkspaceConfig::default());
        }

        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            DbCompareError::config(format!("Invalid config file '{}': {}", path.display(), e))
        })
    }

    /// Create configuration file with optional force overwrite
    pub fn create_config_with_force(&self, force: bool) -> Result<()> {
        let config_path = self.config_path();

        if config_path.exists() && !force {
            return Ok(());
        }

        fs::create_dir_all(&self.dbcompare_dir)?;
        let config = WorkspaceConfig::default();
        fs::write(config_path, serde_json::to_string_pretty(&config)?)?;
        Ok(())
    }

    /// Ensure .gitignore keeps credentials and job state out of version control
    pub fn ensure_gitignore(&self) -> Result<()> {
        let gitignore_path = self.root.join(".gitignore");
        let marker = ".dbcompare/connections.json";
        let entries =
            "# dbcompare credentials and job checkpoints\n.dbcompare/connections.json\n.dbcompare/jobs/\n";

        if gitignore_path.exists() {
            let content = fs::read_to_string(&gitignore_path)?;
            if !content.contains(marker) {
                let new_content = if content.ends_with('\n') {
                    format!("{}\n{}", content, entries)
                } else {
                    format!("{}\n\n{}", content, entries)
                };
                fs::write(gitignore_path, new_content)?;
                log::info!("Updated .gitignore with dbcompare entries");
            }
        } else {
            fs::write(gitignore_path, entries)?;
            log::info!("Created .gitignore with dbcompare entries");
        }

        Ok(())
    }

    /// Get workspace statistics
    pub fn stats(&self) -> Result<WorkspaceStats> {
        let mut stats = WorkspaceStats::default();

        if self.jobs_dir.exists() {
            for entry in WalkDir::new(&self.jobs_dir).max_depth(1) {
                let entry = entry?;
                let path = entry.path();
                if entry.file_type().is_file()
                    && path.extension().map_or(false, |ext| ext == "json")
                {
                    stats.job_count += 1;
                    stats.total_job_size += entry.metadata()?.len();
                }
            }
        }

        stats.has_connections = self.connections_path().exists();
        Ok(stats)
    }
}

/// Write a file by renaming a fully written sibling into place
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| DbCompareError::workspace(format!("Not a file path: {}", path.display())))?;
    let tmp_path = path.with_file_name(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        uuid::Uuid::new_v4().simple()
    ));

    if let Err(e) = fs::write(&tmp_path, contents).and_then(|_| fs::rename(&tmp_path, path)) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Check that a job id is safe to use as a file name
pub fn validate_job_id(job_id: &str) -> Result<()> {
    let valid = !job_id.is_empty()
        && job_id.len() <= 128
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(DbCompareError::validation(format!(
            "Invalid job id '{}': use letters, digits, '-' or '_'",
            job_id
        )))
    }
}

/// Statistics about the workspace
#[derive(Debug, Default)]
pub struct WorkspaceStats {
    pub job_count: usize,
    pub total_job_size: u64,
    pub has_connections: bool,
}
