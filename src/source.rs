//! Interfaces to the databases being compared and to their connection settings

use crate::data_compare::RowSet;
use crate::error::{DbCompareError, Result};
use crate::schema::ColumnDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of database a connection points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    DuckDb,
    Sqlite,
    Postgres,
    Mysql,
}

impl Driver {
    /// DuckDB extension needed to attach this kind of database, if any
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Driver::DuckDb => None,
            Driver::Sqlite => Some("sqlite"),
            Driver::Postgres => Some("postgres"),
            Driver::Mysql => Some("mysql"),
        }
    }

    /// True when `database` is a file path rather than a database name
    pub fn is_file_based(&self) -> bool {
        matches!(self, Driver::DuckDb | Driver::Sqlite)
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Driver::DuckDb => "duckdb",
            Driver::Sqlite => "sqlite",
            Driver::Postgres => "postgres",
            Driver::Mysql => "mysql",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Driver {
    type Err = DbCompareError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "duckdb" => Ok(Driver::DuckDb),
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            "postgres" | "postgresql" => Ok(Driver::Postgres),
            "mysql" => Ok(Driver::Mysql),
            other => Err(DbCompareError::invalid_input(format!(
                "Unsupported driver '{}'. Expected one of: duckdb, sqlite, postgres, mysql",
                other
            ))),
        }
    }
}

/// Settings needed to reach one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub name: String,
    #[serde(default)]
    pub server: String,
    pub database: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub driver: Driver,
}

impl ConnectionInfo {
    /// Connection to a local DuckDB or SQLite file
    pub fn file(name: impl Into<String>, driver: Driver, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server: String::new(),
            database: path.into(),
            username: String::new(),
            password: String::new(),
            driver,
        }
    }
}

/// A database that can be inspected for comparison.
///
/// `connect` must succeed before any other call; implementations report a
/// failure to reach the database as [`DbCompareError::Connection`] carrying
/// [`DataSource::name`].
pub trait DataSource {
    /// Connection name, used in error messages and job checkpoints
    fn name(&self) -> &str;

    fn connect(&mut self) -> Result<()>;

    /// Table names, sorted
    fn list_tables(&self) -> Result<Vec<String>>;

    /// Column descriptors in declaration order
    fn get_schema(&self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Up to `limit` rows, restricted to `columns` when given
    fn get_rows(&self, table: &str, columns: Option<&[String]>, limit: usize) -> Result<RowSet>;

    /// Total number of rows in the table, not bounded by any sample limit
    fn count_rows(&self, table: &str) -> Result<u64>;

    /// A `CREATE TABLE` script followed by foreign keys and indexes
    fn get_ddl_script(&self, table: &str) -> Result<String>;
}

/// Resolves connection names to connection settings
pub trait ConnectionStore {
    fn get_connection_by_name(&self, name: &str) -> Result<Option<ConnectionInfo>>;
}

/// Look up a connection, turning an unknown name into a not-found error
pub fn resolve_connection(store: &dyn ConnectionStore, name: &str) -> Result<ConnectionInfo> {
    store
        .get_connection_by_name(name)?
        .ok_or_else(|| DbCompareError::connection_not_found(name))
}
