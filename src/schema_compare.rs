//! Column-level schema comparison between two tables

use crate::schema::{yes_no, ColumnDescriptor};
use crate::structural::{render_value, structural_diff, StructuralChange};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Result of comparing two column descriptor lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDiffResult {
    pub common_columns: Vec<String>,
    pub only_in_source: Vec<String>,
    pub only_in_target: Vec<String>,
    pub differences: Vec<ColumnDiff>,
    pub total_columns_source: usize,
    pub total_columns_target: usize,
    pub identical_columns: usize,
}

/// Differences found for one column present on both sides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDiff {
    pub column_name: String,
    pub source: ColumnDescriptor,
    pub target: ColumnDescriptor,
    pub differences: Vec<String>,
}

impl SchemaDiffResult {
    /// Check if the two schemas differ in any way
    pub fn has_changes(&self) -> bool {
        !self.differences.is_empty()
            || !self.only_in_source.is_empty()
            || !self.only_in_target.is_empty()
    }
}

/// Compare two schemas column by column.
///
/// When `column_filter` is given both sides are restricted to those names
/// before anything else happens. Output name lists are sorted and
/// `differences` follows the same order.
pub fn compare_schema(
    source: &[ColumnDescriptor],
    target: &[ColumnDescriptor],
    column_filter: Option<&BTreeSet<String>>,
) -> SchemaDiffResult {
    let keep = |col: &&ColumnDescriptor| column_filter.map_or(true, |f| f.contains(&col.name));

    let source_by_name: BTreeMap<&str, &ColumnDescriptor> = source
        .iter()
        .filter(keep)
        .map(|col| (col.name.as_str(), col))
        .collect();
    let target_by_name: BTreeMap<&str, &ColumnDescriptor> = target
        .iter()
        .filter(keep)
        .map(|col| (col.name.as_str(), col))
        .collect();

    let mut common_columns = Vec::new();
    let mut only_in_source = Vec::new();
    let mut differences = Vec::new();

    for (name, source_col) in &source_by_name {
        match target_by_name.get(name) {
            Some(target_col) => {
                common_columns.push(name.to_string());
                let column_diffs = compare_column(source_col, target_col);
                if !column_diffs.is_empty() {
                    differences.push(ColumnDiff {
                        column_name: name.to_string(),
                        source: (*source_col).clone(),
                        target: (*target_col).clone(),
                        differences: column_diffs,
                    });
                }
            }
            None => only_in_source.push(name.to_string()),
        }
    }

    let only_in_target: Vec<String> = target_by_name
        .keys()
        .filter(|name| !source_by_name.contains_key(*name))
        .map(|name| name.to_string())
        .collect();

    let identical_columns = common_columns.len() - differences.len();

    SchemaDiffResult {
        total_columns_source: source_by_name.len(),
        total_columns_target: target_by_name.len(),
        common_columns,
        only_in_source,
        only_in_target,
        differences,
        identical_columns,
    }
}

/// Field-by-field comparison of two descriptors for the same column name
fn compare_column(source: &ColumnDescriptor, target: &ColumnDescriptor) -> Vec<String> {
    let mut diffs = Vec::new();

    if source.formatted_type != target.formatted_type {
        diffs.push(format!(
            "Data type: {} vs {}",
            source.formatted_type, target.formatted_type
        ));
    }

    if source.nullable != target.nullable {
        diffs.push(format!(
            "Nullable: {} vs {}",
            yes_no(source.nullable),
            yes_no(target.nullable)
        ));
    }

    if source.identity != target.identity {
        diffs.push(format!(
            "Identity: {} vs {}",
            yes_no(source.identity),
            yes_no(target.identity)
        ));
    }

    if source.primary_key != target.primary_key {
        diffs.push(format!(
            "Primary Key: {} vs {}",
            yes_no(source.primary_key),
            yes_no(target.primary_key)
        ));
    }

    diffs.extend(compare_metadata(
        source.metadata.as_ref(),
        target.metadata.as_ref(),
    ));

    diffs
}

/// Structural diff of the free-form metadata, rendered as diff strings
fn compare_metadata(source: Option<&Value>, target: Option<&Value>) -> Vec<String> {
    let null = Value::Null;
    let source = source.unwrap_or(&null);
    let target = target.unwrap_or(&null);

    structural_diff("metadata", source, target)
        .into_iter()
        .map(|change| match change {
            StructuralChange::Changed {
                path,
                source,
                target,
            } => format!("{}: {} vs {}", path, render_value(&source), render_value(&target)),
            StructuralChange::Added { path, .. } => {
                format!("Structure change: item added at {}", path)
            }
            StructuralChange::Removed { path, .. } => {
                format!("Structure change: item removed at {}", path)
            }
        })
        .collect()
}
