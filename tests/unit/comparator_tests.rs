//! Unit tests for the schema, data and script comparators

use crate::common::{row, sample_data};
use dbcompare::data_compare::{compare_data, RowSet};
use dbcompare::schema::ColumnDescriptor;
use dbcompare::schema_compare::compare_schema;
use dbcompare::script_compare::{compare_scripts, DiffLineRole};
use serde_json::json;
use std::collections::BTreeSet;

#[test]
fn test_schema_widened_varchar_and_added_column() {
    let diff = compare_schema(&sample_data::products_v1(), &sample_data::products_v2(), None);

    assert_eq!(diff.common_columns, vec!["id", "name", "price"]);
    assert!(diff.only_in_source.is_empty());
    assert_eq!(diff.only_in_target, vec!["stock"]);
    assert_eq!(diff.identical_columns, 2);
    assert_eq!(diff.total_columns_source, 3);
    assert_eq!(diff.total_columns_target, 4);

    assert_eq!(diff.differences.len(), 1);
    assert_eq!(diff.differences[0].column_name, "name");
    assert_eq!(
        diff.differences[0].differences,
        vec!["Data type: varchar(100) vs varchar(200)"]
    );
    assert!(diff.has_changes());
}

#[test]
fn test_schema_counts_add_up() {
    let diff = compare_schema(&sample_data::products_v2(), &sample_data::products_v1(), None);

    assert_eq!(
        diff.common_columns.len() + diff.only_in_source.len(),
        diff.total_columns_source
    );
    assert_eq!(
        diff.common_columns.len() + diff.only_in_target.len(),
        diff.total_columns_target
    );
    assert_eq!(
        diff.identical_columns + diff.differences.len(),
        diff.common_columns.len()
    );
}

#[test]
fn test_schema_filter_restricts_both_sides() {
    let filter: BTreeSet<String> = ["id".to_string(), "stock".to_string()].into_iter().collect();
    let diff = compare_schema(
        &sample_data::products_v1(),
        &sample_data::products_v2(),
        Some(&filter),
    );

    assert_eq!(diff.total_columns_source, 1);
    assert_eq!(diff.total_columns_target, 2);
    assert_eq!(diff.common_columns, vec!["id"]);
    assert_eq!(diff.only_in_target, vec!["stock"]);
    assert!(diff.differences.is_empty());
}

#[test]
fn test_schema_reports_every_changed_attribute() {
    let source = vec![ColumnDescriptor::new("id", "integer", None, Some(32), Some(0))];
    let target = vec![ColumnDescriptor::new("id", "bigint", None, Some(64), Some(0))
        .nullable(false)
        .identity(true)
        .primary_key(true)];

    let diff = compare_schema(&source, &target, None);
    let entries = &diff.differences[0].differences;
    assert_eq!(entries.len(), 4);
    assert!(entries[0].starts_with("Data type:"));
    assert_eq!(entries[1], "Nullable: Yes vs No");
    assert_eq!(entries[2], "Identity: No vs Yes");
    assert_eq!(entries[3], "Primary Key: No vs Yes");
}

#[test]
fn test_data_null_versus_value() {
    let source = RowSet::new(
        vec!["id".into(), "price".into()],
        vec![row(&[("id", json!(1)), ("price", json!(null))])],
    );
    let target = RowSet::new(
        vec!["id".into(), "price".into()],
        vec![row(&[("id", json!(1)), ("price", json!(10.99))])],
    );

    let diff = compare_data(&source, &target, &["id".to_string(), "price".to_string()]);
    assert_eq!(diff.summary.rows_with_differences, 1);
    let cell = &diff.data_differences[0].differences["price"];
    assert_eq!(cell.source, "NULL");
    assert_eq!(cell.target, "10.99");
    assert!(!diff.data_differences[0].differences.contains_key("id"));
}

#[test]
fn test_data_unequal_sample_sizes() {
    let make = |n: i64| {
        RowSet::new(
            vec!["id".into()],
            (0..n).map(|i| row(&[("id", json!(i))])).collect(),
        )
    };

    let diff = compare_data(&make(5), &make(3), &["id".to_string()]);
    assert_eq!(diff.summary.total_rows_compared, 3);
    assert_eq!(diff.summary.row_count_difference, 2);
    assert!(diff.data_differences.is_empty());
    assert!(diff.has_changes());
}

#[test]
fn test_data_skips_columns_missing_on_one_side() {
    let source = RowSet::new(vec!["a".into()], vec![row(&[("a", json!(1))])]);
    let target = RowSet::new(vec!["b".into()], vec![row(&[("b", json!(2))])]);

    let diff = compare_data(&source, &target, &["a".to_string(), "b".to_string()]);
    assert!(diff.summary.columns_compared.is_empty());
    assert_eq!(diff.summary.total_rows_compared, 0);
    assert_eq!(diff.summary.source_total_rows, 1);
}

#[test]
fn test_data_nested_difference_paths() {
    let source = RowSet::new(
        vec!["meta".into()],
        vec![row(&[("meta", json!({"stats": {"cardinality": 1000}}))])],
    );
    let target = RowSet::new(
        vec!["meta".into()],
        vec![row(&[("meta", json!({"stats": {"cardinality": 1200}}))])],
    );

    let diff = compare_data(&source, &target, &["meta".to_string()]);
    let cells = &diff.data_differences[0].differences;
    assert!(cells.contains_key("meta"));
    let nested = &cells["meta['stats']['cardinality']"];
    assert_eq!(nested.source, "1000");
    assert_eq!(nested.target, "1200");
}

#[test]
fn test_script_single_changed_line() {
    let source = "CREATE TABLE t (\n    a INT,\n    b VARCHAR(50)\n);";
    let target = "CREATE TABLE t (\n    a INT,\n    b VARCHAR(100)\n);";

    let diff = compare_scripts(source, target);
    assert!(diff.has_differences);

    let texts: Vec<&str> = diff.diff_lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts[0], "--- Source Database");
    assert_eq!(texts[1], "+++ Target Database");
    assert!(texts.contains(&"-    b VARCHAR(50)"));
    assert!(texts.contains(&"+    b VARCHAR(100)"));

    let removed = diff
        .diff_lines
        .iter()
        .filter(|l| l.role == DiffLineRole::Removed)
        .count();
    let added = diff
        .diff_lines
        .iter()
        .filter(|l| l.role == DiffLineRole::Added)
        .count();
    assert_eq!((removed, added), (1, 1));
}

#[test]
fn test_script_identical() {
    let diff = compare_scripts("CREATE TABLE t (a INT);", "CREATE TABLE t (a INT);");
    assert!(!diff.has_differences);
    assert!(diff.diff_lines.is_empty());
    assert_eq!(diff.source_script, diff.target_script);
}
