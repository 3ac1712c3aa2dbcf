//! Error types for dbcompare operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbCompareError>;

#[derive(Error, Debug)]
pub enum DbCompareError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// A data source could not be reached. Carries the connection name so the
    /// caller can tell which side failed.
    #[error("Failed to connect to '{name}': {message}")]
    Connection { name: String, message: String },

    #[error("Connection not found: {name}")]
    ConnectionNotFound { name: String },

    #[error("Table '{table}' not found in '{source_name}'")]
    TableNotFound { table: String, source_name: String },

    #[error("Comparison job not found: {job_id}")]
    JobNotFound { job_id: String },

    /// A failure while diffing one table inside a batch. The whole batch is
    /// discarded when this is raised.
    #[error("Comparison of table '{table}' failed: {message}")]
    Comparison { table: String, message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Formatting error: {message}")]
    Format { message: String },

    #[error("Comparison job '{job_id}' is already being advanced by another caller")]
    JobBusy { job_id: String },

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl DbCompareError {
    pub fn workspace(msg: impl Into<String>) -> Self {
        Self::Workspace(msg.into())
    }

    pub fn connection(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Connection {
            name: name.into(),
            message: msg.into(),
        }
    }

    pub fn connection_not_found(name: impl Into<String>) -> Self {
        Self::ConnectionNotFound { name: name.into() }
    }

    pub fn table_not_found(table: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
            source_name: source_name.into(),
        }
    }

    pub fn job_not_found(job_id: impl Into<String>) -> Self {
        Self::JobNotFound {
            job_id: job_id.into(),
        }
    }

    pub fn comparison(table: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Comparison {
            table: table.into(),
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    /// True for the "named thing does not exist" family of errors
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ConnectionNotFound { .. } | Self::TableNotFound { .. } | Self::JobNotFound { .. }
        )
    }
}
