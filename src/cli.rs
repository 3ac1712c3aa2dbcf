//! Command-line interface for dbcompare

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dbcompare")]
#[command(about = "Compare schemas and sampled data between two databases")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override workspace location
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize dbcompare workspace
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Show workspace status: saved connections and stored jobs
    Status,

    /// Manage saved connections
    Connection {
        #[command(subcommand)]
        action: ConnectionAction,
    },

    /// Compare the schemas of every table in two databases
    Schema {
        /// Source connection name
        source: String,

        /// Target connection name
        target: String,

        /// Resume or name the comparison job (generated when omitted)
        #[arg(long)]
        job_id: Option<String>,

        /// Tables compared per batch (defaults to the workspace setting)
        #[arg(long, value_parser = validate_positive)]
        batch_size: Option<usize>,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,

        /// Keep the job checkpoint after printing the results
        #[arg(long)]
        keep_job: bool,
    },

    /// Apply a single batch of a comparison job and print the response as JSON
    Batch {
        /// Source connection name
        source: String,

        /// Target connection name
        target: String,

        #[arg(long)]
        job_id: String,

        /// Index of the first table of this batch
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Number of tables in this batch (defaults to the workspace setting)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the results of a comparison job
    Results {
        #[arg(long)]
        job_id: String,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Delete a comparison job's checkpoint
    Cleanup {
        #[arg(long)]
        job_id: String,

        /// Remove a lock left behind by an interrupted run first
        #[arg(long)]
        force: bool,
    },

    /// List comparison jobs
    Jobs {
        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Compare one table's schema and, optionally, a sample of its rows
    Compare {
        /// Source connection name
        source: String,

        /// Target connection name
        target: String,

        /// Table to compare
        #[arg(long)]
        table: String,

        /// Table name on the target side, when it differs
        #[arg(long)]
        target_table: Option<String>,

        /// Restrict the comparison to these columns (comma-separated)
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,

        /// Also compare a sample of rows
        #[arg(long)]
        data: bool,

        /// Number of rows sampled from each side (defaults to the workspace setting)
        #[arg(long, value_parser = validate_positive)]
        limit: Option<usize>,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Diff the generated CREATE TABLE scripts of one table
    Script {
        /// Source connection name
        source: String,

        /// Target connection name
        target: String,

        /// Table to compare
        #[arg(long)]
        table: String,

        /// Table name on the target side, when it differs
        #[arg(long)]
        target_table: Option<String>,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum ConnectionAction {
    /// Save a connection
    Add {
        /// Connection name
        name: String,

        /// Database kind: duckdb, sqlite, postgres, mysql
        #[arg(long, default_value = "duckdb")]
        driver: String,

        /// Database name, or file path for duckdb and sqlite
        #[arg(long)]
        database: String,

        /// Host for postgres and mysql
        #[arg(long, default_value = "")]
        server: String,

        #[arg(long, default_value = "")]
        username: String,

        /// Password; `{VAR}` is replaced by the environment variable VAR on use
        #[arg(long, default_value = "")]
        password: String,

        /// Replace an existing connection with the same name
        #[arg(long)]
        replace: bool,
    },

    /// List saved connections
    List {
        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Remove a saved connection
    Remove {
        /// Connection name
        name: String,
    },

    /// Check that a saved connection can be opened
    Test {
        /// Connection name
        name: String,
    },
}

/// Parse output format string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}

/// Validate that a count is greater than 0
fn validate_positive(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("Invalid value: '{}'. Must be a positive integer.", s))?;

    if value == 0 {
        return Err("Value must be greater than 0".to_string());
    }

    Ok(value)
}
