//! Output formatting utilities

use crate::connections::StoredConnection;
use crate::data_compare::DataDiffResult;
use crate::error::{DbCompareError, Result};
use crate::job::{ComparisonJob, TableSchemaStatus};
use crate::schema_compare::SchemaDiffResult;
use crate::script_compare::ScriptDiffResult;
use crate::table_compare::TableComparison;
use crate::workspace::WorkspaceStats;
use std::fmt::Write;

/// Shown in place of any output that failed to render
pub const RENDER_PLACEHOLDER: &str = "<output unavailable>";

/// Use the rendered text, or log the failure and fall back to a placeholder
pub fn render_or_placeholder(rendered: Result<String>) -> String {
    match rendered {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Failed to render output: {}", e);
            RENDER_PLACEHOLDER.to_string()
        }
    }
}

fn fmt_err(e: std::fmt::Error) -> DbCompareError {
    DbCompareError::format(e.to_string())
}

fn branch(is_last: bool) -> &'static str {
    if is_last {
        "└─"
    } else {
        "├─"
    }
}

fn indent(is_last: bool) -> &'static str {
    if is_last {
        "   "
    } else {
        "│  "
    }
}

/// Tree-style terminal output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Render workspace statistics
    pub fn format_workspace_stats(stats: &WorkspaceStats) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "📊 dbcompare workspace").map_err(fmt_err)?;
        writeln!(out, "├─ Jobs: {}", stats.job_count).map_err(fmt_err)?;
        writeln!(out, "├─ Checkpoint size: {}", format_bytes(stats.total_job_size))
            .map_err(fmt_err)?;
        writeln!(
            out,
            "└─ Connections file: {}",
            if stats.has_connections { "present" } else { "none" }
        )
        .map_err(fmt_err)?;
        Ok(out)
    }

    /// Render saved connections, never showing passwords
    pub fn format_connections(connections: &[StoredConnection]) -> Result<String> {
        if connections.is_empty() {
            return Ok("No connections saved.\n".to_string());
        }

        let mut out = String::new();
        writeln!(out, "🔌 Connections:").map_err(fmt_err)?;
        for (i, conn) in connections.iter().enumerate() {
            let last = i == connections.len() - 1;
            let info = &conn.info;
            let location = if info.server.is_empty() {
                info.database.clone()
            } else {
                format!("{}/{}", info.server, info.database)
            };
            writeln!(out, "{} {} [{}] {}", branch(last), info.name, info.driver, location)
                .map_err(fmt_err)?;
            let used = conn
                .last_used_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "never".to_string());
            writeln!(
                out,
                "{}└─ created {}, last used {}",
                indent(last),
                conn.created_at.format("%Y-%m-%d %H:%M:%S"),
                used
            )
            .map_err(fmt_err)?;
        }
        Ok(out)
    }

    /// Render a schema comparison of one table
    pub fn format_schema_diff(title: &str, diff: &SchemaDiffResult) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "🔍 Schema: {}", title).map_err(fmt_err)?;
        writeln!(
            out,
            "├─ Columns: {} source, {} target, {} common",
            diff.total_columns_source,
            diff.total_columns_target,
            diff.common_columns.len()
        )
        .map_err(fmt_err)?;
        writeln!(out, "├─ Identical columns: {}", diff.identical_columns).map_err(fmt_err)?;

        if !diff.only_in_source.is_empty() {
            writeln!(out, "├─ ❌ Only in source: {}", diff.only_in_source.join(", "))
                .map_err(fmt_err)?;
        }
        if !diff.only_in_target.is_empty() {
            writeln!(out, "├─ ❌ Only in target: {}", diff.only_in_target.join(", "))
                .map_err(fmt_err)?;
        }

        if diff.differences.is_empty() {
            let verdict = if diff.has_changes() {
                "└─ Shared columns match"
            } else {
                "└─ ✅ Schemas match"
            };
            writeln!(out, "{}", verdict).map_err(fmt_err)?;
            return Ok(out);
        }

        writeln!(out, "└─ ❌ Changed columns: {}", diff.differences.len()).map_err(fmt_err)?;
        for (i, column) in diff.differences.iter().enumerate() {
            let last = i == diff.differences.len() - 1;
            writeln!(out, "   {} {}", branch(last), column.column_name).map_err(fmt_err)?;
            for (j, entry) in column.differences.iter().enumerate() {
                let last_entry = j == column.differences.len() - 1;
                writeln!(out, "   {}{} {}", indent(last), branch(last_entry), entry)
                    .map_err(fmt_err)?;
            }
        }
        Ok(out)
    }

    /// Render a sampled data comparison; rows are numbered from 1
    pub fn format_data_diff(
        diff: &DataDiffResult,
        source_row_count: Option<u64>,
        target_row_count: Option<u64>,
    ) -> Result<String> {
        let summary = &diff.summary;
        let with_total = |sampled: usize, total: Option<u64>| match total {
            Some(total) => format!("{} sampled of {}", sampled, total),
            None => sampled.to_string(),
        };

        let mut out = String::new();
        writeln!(out, "📊 Data").map_err(fmt_err)?;
        writeln!(
            out,
            "├─ Source rows: {}",
            with_total(summary.source_total_rows, source_row_count)
        )
        .map_err(fmt_err)?;
        writeln!(
            out,
            "├─ Target rows: {}",
            with_total(summary.target_total_rows, target_row_count)
        )
        .map_err(fmt_err)?;
        writeln!(out, "├─ Columns compared: {}", summary.columns_compared.join(", "))
            .map_err(fmt_err)?;
        writeln!(out, "├─ Rows compared: {}", summary.total_rows_compared).map_err(fmt_err)?;
        writeln!(out, "├─ Row count difference: {}", summary.row_count_difference)
            .map_err(fmt_err)?;

        if diff.data_differences.is_empty() {
            writeln!(out, "└─ ✅ No differences in compared rows").map_err(fmt_err)?;
            return Ok(out);
        }

        writeln!(out, "└─ ❌ Rows with differences: {}", summary.rows_with_differences)
            .map_err(fmt_err)?;
        for (i, row) in diff.data_differences.iter().enumerate() {
            let last = i == diff.data_differences.len() - 1;
            writeln!(out, "   {} Row {}", branch(last), row.row_index + 1).map_err(fmt_err)?;
            for (j, (column, cell)) in row.differences.iter().enumerate() {
                let last_cell = j == row.differences.len() - 1;
                writeln!(
                    out,
                    "   {}{} {}: {} → {}",
                    indent(last),
                    branch(last_cell),
                    column,
                    cell.source,
                    cell.target
                )
                .map_err(fmt_err)?;
            }
        }
        Ok(out)
    }

    /// Render a table comparison: schema first, then data when present
    pub fn format_table_comparison(comparison: &TableComparison) -> Result<String> {
        let title = format!(
            "{}.{} → {}.{}",
            comparison.source_connection,
            comparison.source_table,
            comparison.target_connection,
            comparison.target_table
        );
        let mut out = Self::format_schema_diff(&title, &comparison.schema)?;
        if let Some(data) = &comparison.data {
            out.push('\n');
            out.push_str(&Self::format_data_diff(
                data,
                comparison.source_row_count,
                comparison.target_row_count,
            )?);
        }
        Ok(out)
    }

    /// Render a script diff as plain unified diff text
    pub fn format_script_diff(diff: &ScriptDiffResult) -> Result<String> {
        if !diff.has_differences {
            return Ok("✅ Scripts are identical\n".to_string());
        }
        let mut out = diff.unified_text();
        out.push('\n');
        Ok(out)
    }

    /// Render the statuses of one batch or of a whole job
    pub fn format_table_statuses(statuses: &[TableSchemaStatus]) -> Result<String> {
        let mut out = String::new();
        for (i, status) in statuses.iter().enumerate() {
            let last = i == statuses.len() - 1;
            let line = match (status.in_source, status.in_target) {
                (true, false) => format!("❌ {}: only in source", status.table_name),
                (false, true) => format!("❌ {}: only in target", status.table_name),
                _ => {
                    let mut parts = Vec::new();
                    if !status.column_diffs.is_empty() {
                        parts.push(format!("{} changed", status.column_diffs.len()));
                    }
                    if !status.columns_only_in_source.is_empty() {
                        parts.push(format!("{} only in source", status.columns_only_in_source.len()));
                    }
                    if !status.columns_only_in_target.is_empty() {
                        parts.push(format!("{} only in target", status.columns_only_in_target.len()));
                    }
                    let icon = if status.has_differences { "❌" } else { "✅" };
                    if parts.is_empty() {
                        format!("{} {}", icon, status.table_name)
                    } else {
                        format!("{} {}: columns {}", icon, status.table_name, parts.join(", "))
                    }
                }
            };
            writeln!(out, "{} {}", branch(last), line).map_err(fmt_err)?;

            for (j, column) in status.column_diffs.iter().enumerate() {
                let last_column = j == status.column_diffs.len() - 1;
                writeln!(
                    out,
                    "{}{} {}: {}",
                    indent(last),
                    branch(last_column),
                    column.column_name,
                    column.differences.join("; ")
                )
                .map_err(fmt_err)?;
            }
        }
        Ok(out)
    }

    /// Render the final state of a catalog comparison job
    pub fn format_job_results(job: &ComparisonJob) -> Result<String> {
        let mut out = String::new();
        writeln!(
            out,
            "🗂  Job {}: {} → {}",
            job.job_id, job.source_connection, job.target_connection
        )
        .map_err(fmt_err)?;
        writeln!(
            out,
            "   {}/{} tables compared ({}%), {} with differences",
            job.processed_offset,
            job.total_tables,
            job.progress(),
            job.tables_with_differences()
        )
        .map_err(fmt_err)?;
        if job.accumulated_results.is_empty() {
            writeln!(out, "└─ No tables compared").map_err(fmt_err)?;
        } else {
            out.push_str(&Self::format_table_statuses(&job.accumulated_results)?);
        }
        Ok(out)
    }

    /// Render the list of stored jobs
    pub fn format_job_list(jobs: &[ComparisonJob]) -> Result<String> {
        if jobs.is_empty() {
            return Ok("No comparison jobs found.\n".to_string());
        }

        let mut out = String::new();
        writeln!(out, "🗂  Comparison jobs:").map_err(fmt_err)?;
        for (i, job) in jobs.iter().enumerate() {
            let state = if job.is_complete() { "complete" } else { "in progress" };
            writeln!(
                out,
                "{} {} {} → {} ({}, {}/{} tables, updated {})",
                branch(i == jobs.len() - 1),
                job.job_id,
                job.source_connection,
                job.target_connection,
                state,
                job.processed_offset,
                job.total_tables,
                job.updated_at.format("%Y-%m-%d %H:%M:%S")
            )
            .map_err(fmt_err)?;
        }
        Ok(out)
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        serde_json::to_string_pretty(data).map_err(|e| DbCompareError::format(e.to_string()))
    }
}

/// Format bytes in human-readable format
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
