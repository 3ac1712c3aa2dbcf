//! # dbcompare
//!
//! Compares two relational databases: table schemas column by column, a
//! bounded sample of rows cell by cell, and generated DDL scripts as unified
//! diffs. Whole-catalog schema comparison runs as a resumable job advanced in
//! batches and checkpointed after each one.

pub mod cli;
pub mod error;
pub mod workspace;
pub mod schema;
pub mod structural;
pub mod schema_compare;
pub mod data_compare;
pub mod script_compare;
pub mod source;
pub mod duckdb_source;
pub mod connections;
pub mod checkpoint;
pub mod job;
pub mod table_compare;
pub mod commands;
pub mod output;
pub mod progress;

pub use error::{DbCompareError, Result};
pub use workspace::DbCompareWorkspace;

/// Current format version for workspace files
pub const FORMAT_VERSION: &str = "1.0.0";

/// Default number of rows sampled from each side of a data comparison
pub const DEFAULT_ROW_LIMIT: usize = 50;

/// Default number of tables compared per job batch
pub const DEFAULT_BATCH_SIZE: usize = 10;
