//! Positional comparison of two bounded row samples
//!
//! Rows are aligned by index, not by key: row `i` of the source is compared to
//! row `i` of the target, up to the length of the shorter sample. Rows past
//! that point only show up in the row count difference.

use crate::structural::{
    is_structured, render_value, structural_diff, values_equal, StructuralChange, ABSENT_SENTINEL,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row, keyed by column name in column order
pub type Row = IndexMap<String, Value>;

/// A bounded sample of rows fetched from one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub total_rows: usize,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let total_rows = rows.len();
        Self {
            columns,
            rows,
            total_rows,
        }
    }

    /// Check whether the sample carries a column
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// Aggregate counters of a data comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataDiffSummary {
    pub source_total_rows: usize,
    pub target_total_rows: usize,
    pub total_rows_compared: usize,
    pub rows_with_differences: usize,
    pub columns_compared: Vec<String>,
    pub row_count_difference: usize,
}

/// Source/target rendering of one differing cell (or nested path)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDiff {
    pub source: String,
    pub target: String,
}

/// Differences found at one row position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowDiff {
    pub row_index: usize,
    pub differences: IndexMap<String, CellDiff>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataDiffResult {
    pub summary: DataDiffSummary,
    pub data_differences: Vec<RowDiff>,
}

impl DataDiffResult {
    pub fn has_changes(&self) -> bool {
        !self.data_differences.is_empty() || self.summary.row_count_difference > 0
    }
}

/// Compare two row samples over the requested columns.
///
/// Only columns present in both samples are compared. An empty intersection
/// yields a result with no compared rows but with the row counts filled in.
pub fn compare_data(source: &RowSet, target: &RowSet, columns: &[String]) -> DataDiffResult {
    let columns_compared: Vec<String> = columns
        .iter()
        .filter(|c| source.has_column(c) && target.has_column(c))
        .cloned()
        .collect();

    let row_count_difference = source.total_rows.abs_diff(target.total_rows);

    if columns_compared.is_empty() {
        return DataDiffResult {
            summary: DataDiffSummary {
                source_total_rows: source.total_rows,
                target_total_rows: target.total_rows,
                total_rows_compared: 0,
                rows_with_differences: 0,
                columns_compared,
                row_count_difference,
            },
            data_differences: Vec::new(),
        };
    }

    let rows_to_compare = source.rows.len().min(target.rows.len());
    let mut data_differences = Vec::new();

    for (row_index, (source_row, target_row)) in source
        .rows
        .iter()
        .zip(target.rows.iter())
        .take(rows_to_compare)
        .enumerate()
    {
        let differences = compare_row(source_row, target_row, &columns_compared);
        if !differences.is_empty() {
            data_differences.push(RowDiff {
                row_index,
                differences,
            });
        }
    }

    log::debug!(
        "Compared {} rows over {} columns, {} rows differ",
        rows_to_compare,
        columns_compared.len(),
        data_differences.len()
    );

    DataDiffResult {
        summary: DataDiffSummary {
            source_total_rows: source.total_rows,
            target_total_rows: target.total_rows,
            total_rows_compared: rows_to_compare,
            rows_with_differences: data_differences.len(),
            columns_compared,
            row_count_difference,
        },
        data_differences,
    }
}

/// Compare the cells of one row pair, column by column
fn compare_row(source: &Row, target: &Row, columns: &[String]) -> IndexMap<String, CellDiff> {
    let mut differences = IndexMap::new();
    let null = Value::Null;

    for column in columns {
        let source_value = normalize(source.get(column).unwrap_or(&null));
        let target_value = normalize(target.get(column).unwrap_or(&null));

        if values_equal(source_value, target_value) {
            continue;
        }

        differences.insert(
            column.clone(),
            CellDiff {
                source: render_value(source_value),
                target: render_value(target_value),
            },
        );

        if is_structured(source_value) && is_structured(target_value) {
            for change in structural_diff(column, source_value, target_value) {
                // A root-level change is already covered by the column entry
                if change.path().is_root() {
                    continue;
                }
                let (key, cell) = nested_cell(change);
                differences.entry(key).or_insert(cell);
            }
        }
    }

    differences
}

/// Treat a NaN-like value as null.
///
/// `serde_json` numbers cannot hold NaN, so fetched floats are already
/// normalised by the data source; this only guards the float path.
fn normalize(value: &Value) -> &Value {
    match value {
        Value::Number(n) if n.as_f64().map_or(false, f64::is_nan) => &Value::Null,
        other => other,
    }
}

fn nested_cell(change: StructuralChange) -> (String, CellDiff) {
    match change {
        StructuralChange::Changed {
            path,
            source,
            target,
        } => (
            path.to_string(),
            CellDiff {
                source: render_value(&source),
                target: render_value(&target),
            },
        ),
        StructuralChange::Added { path, value } => (
            path.to_string(),
            CellDiff {
                source: ABSENT_SENTINEL.to_string(),
                target: render_value(&value),
            },
        ),
        StructuralChange::Removed { path, value } => (
            path.to_string(),
            CellDiff {
                source: render_value(&value),
                target: ABSENT_SENTINEL.to_string(),
            },
        ),
    }
}
