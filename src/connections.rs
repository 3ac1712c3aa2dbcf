//! File-backed connection store kept in `.dbcompare/connections.json`

use crate::error::{DbCompareError, Result};
use crate::source::{ConnectionInfo, ConnectionStore};
use crate::workspace::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// A saved connection plus bookkeeping timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredConnection {
    #[serde(flatten)]
    pub info: ConnectionInfo,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

pub struct FileConnectionStore {
    path: PathBuf,
}

impl FileConnectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All saved connections sorted by name; a missing file is an empty store
    pub fn list(&self) -> Result<Vec<StoredConnection>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let mut connections: Vec<StoredConnection> =
            serde_json::from_str(&content).map_err(|e| {
                DbCompareError::config(format!(
                    "Invalid connections file '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;
        connections.sort_by(|a, b| a.info.name.cmp(&b.info.name));
        Ok(connections)
    }

    fn save(&self, connections: &[StoredConnection]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&self.path, serde_json::to_string_pretty(connections)?.as_bytes())
    }

    /// Save a connection. An existing one with the same name is only replaced
    /// when `replace` is set, keeping its creation time.
    pub fn add(&self, info: ConnectionInfo, replace: bool) -> Result<()> {
        if info.name.trim().is_empty() {
            return Err(DbCompareError::invalid_input("Connection name cannot be empty"));
        }

        let mut connections = self.list()?;
        match connections.iter_mut().find(|c| c.info.name == info.name) {
            Some(existing) if replace => {
                existing.info = info;
            }
            Some(_) => {
                return Err(DbCompareError::invalid_input(format!(
                    "Connection '{}' already exists. Use --replace to overwrite it",
                    info.name
                )));
            }
            None => connections.push(StoredConnection {
                info,
                created_at: Utc::now(),
                last_used_at: None,
            }),
        }

        self.save(&connections)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let mut connections = self.list()?;
        let before = connections.len();
        connections.retain(|c| c.info.name != name);
        if connections.len() == before {
            return Err(DbCompareError::connection_not_found(name));
        }
        self.save(&connections)
    }

    /// Record that a connection was just used
    pub fn touch(&self, name: &str) -> Result<()> {
        let mut connections = self.list()?;
        let connection = connections
            .iter_mut()
            .find(|c| c.info.name == name)
            .ok_or_else(|| DbCompareError::connection_not_found(name))?;
        connection.last_used_at = Some(Utc::now());
        self.save(&connections)
    }
}

impl ConnectionStore for FileConnectionStore {
    fn get_connection_by_name(&self, name: &str) -> Result<Option<ConnectionInfo>> {
        let Some(stored) = self.list()?.into_iter().find(|c| c.info.name == name) else {
            return Ok(None);
        };

        let mut info = stored.info;
        info.password = substitute_env_vars(&info.password)?;
        Ok(Some(info))
    }
}

/// Replace `{VAR_NAME}` placeholders with environment variable values
pub fn substitute_env_vars(value: &str) -> Result<String> {
    let mut result = value.to_string();

    let mut start = 0;
    while let Some(open_pos) = result[start..].find('{') {
        let open_pos = start + open_pos;
        let Some(close_pos) = result[open_pos..].find('}') else {
            break;
        };
        let close_pos = open_pos + close_pos;
        let var_name = &result[open_pos + 1..close_pos];

        let var_value = env::var(var_name).map_err(|_| {
            DbCompareError::config(format!("Environment variable '{}' is not set", var_name))
        })?;

        result.replace_range(open_pos..=close_pos, &var_value);
        start = open_pos + var_value.len();
    }

    Ok(result)
}
