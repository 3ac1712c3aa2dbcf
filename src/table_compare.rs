//! One-table comparison: schema, optionally a data sample, and DDL scripts

use crate::data_compare::{compare_data, DataDiffResult};
use crate::error::{DbCompareError, Result};
use crate::schema_compare::{compare_schema, SchemaDiffResult};
use crate::script_compare::{compare_scripts, ScriptDiffResult};
use crate::source::DataSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What to compare between a source table and a target table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableComparisonRequest {
    pub source_table: String,
    pub target_table: String,
    /// Restrict the comparison to these columns
    pub columns: Option<Vec<String>>,
    pub include_data: bool,
    pub row_limit: usize,
}

impl TableComparisonRequest {
    /// Compare a table with the same-named table on the other side
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            source_table: table.clone(),
            target_table: table,
            columns: None,
            include_data: false,
            row_limit: crate::DEFAULT_ROW_LIMIT,
        }
    }

    pub fn target_table(mut self, table: impl Into<String>) -> Self {
        self.target_table = table.into();
        self
    }

    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_data(mut self, row_limit: usize) -> Self {
        self.include_data = true;
        self.row_limit = row_limit;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableComparison {
    pub source_connection: String,
    pub target_connection: String,
    pub source_table: String,
    pub target_table: String,
    pub schema: SchemaDiffResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DataDiffResult>,
    /// Full table row counts, next to the bounded sample sizes in `data`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_row_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_row_count: Option<u64>,
}

/// Compare the schema of one table and, when asked, a sample of its rows
pub fn compare_tables(
    source: &mut dyn DataSource,
    target: &mut dyn DataSource,
    request: &TableComparisonRequest,
) -> Result<TableComparison> {
    source.connect()?;
    target.connect()?;

    let source_schema = source.get_schema(&request.source_table)?;
    let target_schema = target.get_schema(&request.target_table)?;

    let filter: Option<BTreeSet<String>> = request
        .columns
        .as_ref()
        .map(|cols| cols.iter().cloned().collect());
    let schema = compare_schema(&source_schema, &target_schema, filter.as_ref());

    let mut comparison = TableComparison {
        source_connection: source.name().to_string(),
        target_connection: target.name().to_string(),
        source_table: request.source_table.clone(),
        target_table: request.target_table.clone(),
        schema,
        data: None,
        source_row_count: None,
        target_row_count: None,
    };

    if !request.include_data {
        return Ok(comparison);
    }

    // Requested order is kept; without a selection, every shared column
    let columns: Vec<String> = match &request.columns {
        Some(requested) => requested
            .iter()
            .filter(|c| comparison.schema.common_columns.contains(c))
            .cloned()
            .collect(),
        None => comparison.schema.common_columns.clone(),
    };
    if columns.is_empty() {
        return Err(DbCompareError::validation(format!(
            "No overlapping columns selected between '{}' and '{}'",
            request.source_table, request.target_table
        )));
    }

    let source_rows = source.get_rows(&request.source_table, Some(&columns), request.row_limit)?;
    let target_rows = target.get_rows(&request.target_table, Some(&columns), request.row_limit)?;

    log::debug!(
        "Comparing {} source rows with {} target rows over {} columns",
        source_rows.total_rows,
        target_rows.total_rows,
        columns.len()
    );

    comparison.data = Some(compare_data(&source_rows, &target_rows, &columns));
    comparison.source_row_count = Some(source.count_rows(&request.source_table)?);
    comparison.target_row_count = Some(target.count_rows(&request.target_table)?);

    Ok(comparison)
}

/// Diff the generated DDL scripts of a table on both sides
pub fn compare_table_scripts(
    source: &mut dyn DataSource,
    target: &mut dyn DataSource,
    source_table: &str,
    target_table: &str,
) -> Result<ScriptDiffResult> {
    source.connect()?;
    target.connect()?;

    let source_script = source.get_ddl_script(source_table)?;
    let target_script = target.get_ddl_script(target_table)?;
    Ok(compare_scripts(&source_script, &target_script))
}
