//! [`DataSource`] backed by DuckDB
//!
//! Every source gets its own in-memory DuckDB instance with the configured
//! database ATTACHed read-only under a fixed catalog name. DuckDB files are
//! attached natively; SQLite, PostgreSQL and MySQL go through the matching
//! DuckDB extension, so all drivers share the same catalog queries.

use crate::data_compare::{Row, RowSet};
use crate::error::{DbCompareError, Result};
use crate::schema::ColumnDescriptor;
use crate::source::{ConnectionInfo, DataSource, Driver};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use duckdb::types::{TimeUnit, Value as DuckValue};
use duckdb::{params, Connection};
use serde_json::{Map, Number, Value};
use std::path::Path;

/// Catalog name the compared database is attached under
const CATALOG: &str = "src";

/// Days between 0001-01-01 and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub struct DuckDbSource {
    info: ConnectionInfo,
    connection: Option<Connection>,
}

impl DuckDbSource {
    pub fn new(info: ConnectionInfo) -> Self {
        Self {
            info,
            connection: None,
        }
    }

    fn conn(&self) -> Result<&Connection> {
        self.connection
            .as_ref()
            .ok_or_else(|| DbCompareError::connection(&self.info.name, "not connected"))
    }

    /// Build the ATTACH statement for the configured driver
    fn attach_statement(&self) -> String {
        let info = &self.info;
        let target = match info.driver {
            Driver::DuckDb | Driver::Sqlite => info.database.clone(),
            Driver::Postgres => key_value_string(&[
                ("host", &info.server),
                ("dbname", &info.database),
                ("user", &info.username),
                ("password", &info.password),
            ]),
            Driver::Mysql => key_value_string(&[
                ("host", &info.server),
                ("database", &info.database),
                ("user", &info.username),
                ("password", &info.password),
            ]),
        };

        let options = match info.driver.extension() {
            Some(kind) => format!("TYPE {}, READ_ONLY", kind),
            None => "READ_ONLY".to_string(),
        };

        format!(
            "ATTACH {} AS {} ({})",
            quote_literal(&target),
            CATALOG,
            options
        )
    }

    /// Find the schema holding `table`.
    ///
    /// Accepts a bare table name or `schema.table`.
    fn locate(&self, table: &str) -> Result<(String, String)> {
        if let Some(found) = self.find_table(None, table)? {
            return Ok(found);
        }
        if let Some((schema, name)) = table.split_once('.') {
            if let Some(found) = self.find_table(Some(schema), name)? {
                return Ok(found);
            }
        }
        Err(DbCompareError::table_not_found(table, &self.info.name))
    }

    fn find_table(&self, schema: Option<&str>, table: &str) -> Result<Option<(String, String)>> {
        let conn = self.conn()?;
        let to_pair = |row: &duckdb::Row<'_>| -> duckdb::Result<(String, String)> {
            Ok((row.get(0)?, row.get(1)?))
        };

        let found = match schema {
            Some(schema) => conn
                .prepare(
                    "SELECT schema_name, table_name FROM duckdb_tables()
                     WHERE database_name = ? AND schema_name = ? AND table_name = ?",
                )?
                .query_map(params![CATALOG, schema, table], to_pair)?
                .next()
                .transpose()?,
            None => {
                let matches = conn
                    .prepare(
                        "SELECT schema_name, table_name FROM duckdb_tables()
                         WHERE database_name = ? AND table_name = ?
                         ORDER BY schema_name",
                    )?
                    .query_map(params![CATALOG, table], to_pair)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                if matches.len() > 1 {
                    let schemas: Vec<&str> = matches.iter().map(|(s, _)| s.as_str()).collect();
                    return Err(DbCompareError::validation(format!(
                        "Table '{}' exists in schemas {} of '{}'; qualify it as schema.table",
                        table,
                        schemas.join(", "),
                        self.info.name
                    )));
                }
                matches.into_iter().next()
            }
        };
        Ok(found)
    }

    fn qualified_name(schema: &str, table: &str) -> String {
        format!(
            "{}.{}.{}",
            quote_ident(CATALOG),
            quote_ident(schema),
            quote_ident(table)
        )
    }

    fn primary_key_columns(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn()?.prepare(
            "SELECT UNNEST(constraint_column_names) FROM duckdb_constraints()
             WHERE database_name = ? AND schema_name = ? AND table_name = ?
               AND constraint_type = 'PRIMARY KEY'",
        )?;
        let names = stmt
            .query_map(params![CATALOG, schema, table], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn()?.prepare(
            "SELECT constraint_text FROM duckdb_constraints()
             WHERE database_name = ? AND schema_name = ? AND table_name = ?
               AND constraint_type = 'FOREIGN KEY'
             ORDER BY constraint_text",
        )?;
        let texts = stmt
            .query_map(params![CATALOG, schema, table], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(texts)
    }

    fn index_statements(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn()?.prepare(
            "SELECT sql FROM duckdb_indexes()
             WHERE database_name = ? AND schema_name = ? AND table_name = ?
             ORDER BY index_name",
        )?;
        let statements = stmt
            .query_map(params![CATALOG, schema, table], |row| {
                row.get::<_, Option<String>>(0)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(statements.into_iter().flatten().collect())
    }
}

impl DataSource for DuckDbSource {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn connect(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        let name = self.info.name.clone();
        if self.info.driver.is_file_based() && !Path::new(&self.info.database).exists() {
            return Err(DbCompareError::connection(
                name,
                format!("database file not found: {}", self.info.database),
            ));
        }

        let connection =
            Connection::open_in_memory().map_err(|e| DbCompareError::connection(&name, e.to_string()))?;

        if let Some(extension) = self.info.driver.extension() {
            connection
                .execute_batch(&format!("INSTALL {0}; LOAD {0};", extension))
                .map_err(|e| DbCompareError::connection(&name, e.to_string()))?;
        }

        connection
            .execute_batch(&self.attach_statement())
            .map_err(|e| DbCompareError::connection(&name, e.to_string()))?;

        log::debug!(
            "Attached {} database '{}' for connection '{}'",
            self.info.driver,
            self.info.database,
            name
        );
        self.connection = Some(connection);
        Ok(())
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn()?.prepare(
            "SELECT schema_name, table_name FROM duckdb_tables()
             WHERE database_name = ? AND NOT internal
             ORDER BY table_name, schema_name",
        )?;
        let found = stmt
            .query_map(params![CATALOG], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(catalog_names(found))
    }

    fn get_schema(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let (schema, name) = self.locate(table)?;
        let primary_keys = self.primary_key_columns(&schema, &name)?;

        let mut stmt = self.conn()?.prepare(
            "SELECT column_name, data_type,
                    CAST(character_maximum_length AS BIGINT),
                    CAST(numeric_precision AS BIGINT),
                    CAST(numeric_scale AS BIGINT),
                    is_nullable, column_default, comment
             FROM duckdb_columns()
             WHERE database_name = ? AND schema_name = ? AND table_name = ?
             ORDER BY column_index",
        )?;

        let columns = stmt
            .query_map(params![CATALOG, schema, name], |row| {
                let column_name: String = row.get(0)?;
                let data_type: String = row.get(1)?;
                let max_length: Option<i64> = row.get(2)?;
                let precision: Option<i64> = row.get(3)?;
                let scale: Option<i64> = row.get(4)?;
                let nullable: bool = row.get(5)?;
                let default: Option<String> = row.get(6)?;
                let comment: Option<String> = row.get(7)?;

                let is_identity = default
                    .as_deref()
                    .map_or(false, |d| d.trim_start().starts_with("nextval("));
                let is_primary_key = primary_keys.contains(&column_name);

                let mut metadata = Map::new();
                if let Some(default) = default {
                    metadata.insert("default".to_string(), Value::String(default));
                }
                if let Some(comment) = comment.filter(|c| !c.is_empty()) {
                    metadata.insert("comment".to_string(), Value::String(comment));
                }

                let mut descriptor =
                    ColumnDescriptor::new(column_name, data_type, max_length, precision, scale)
                        .nullable(nullable)
                        .identity(is_identity)
                        .primary_key(is_primary_key);
                if !metadata.is_empty() {
                    descriptor = descriptor.with_metadata(Value::Object(metadata));
                }
                Ok(descriptor)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(columns)
    }

    fn get_rows(&self, table: &str, columns: Option<&[String]>, limit: usize) -> Result<RowSet> {
        let (schema, name) = self.locate(table)?;

        let columns: Vec<String> = match columns {
            Some(columns) => columns.to_vec(),
            None => self
                .get_schema(table)?
                .into_iter()
                .map(|c| c.name)
                .collect(),
        };
        if columns.is_empty() {
            return Ok(RowSet::default());
        }

        let select_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} LIMIT {}",
            select_list,
            Self::qualified_name(&schema, &name),
            limit
        );

        let mut stmt = self.conn()?.prepare(&sql)?;
        let mut result_rows = stmt.query([])?;
        let mut rows = Vec::new();
        while let Some(row) = result_rows.next()? {
            let mut values = Row::with_capacity(columns.len());
            for (idx, column) in columns.iter().enumerate() {
                let value: DuckValue = row.get(idx)?;
                values.insert(column.clone(), to_json(value));
            }
            rows.push(values);
        }

        log::debug!(
            "Fetched {} rows from '{}' in '{}'",
            rows.len(),
            table,
            self.info.name
        );
        Ok(RowSet::new(columns, rows))
    }

    fn count_rows(&self, table: &str) -> Result<u64> {
        let (schema, name) = self.locate(table)?;
        let sql = format!(
            "SELECT COUNT(*) FROM {}",
            Self::qualified_name(&schema, &name)
        );
        let count: i64 = self.conn()?.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn get_ddl_script(&self, table: &str) -> Result<String> {
        let (schema, name) = self.locate(table)?;
        let columns = self.get_schema(table)?;

        let mut definitions: Vec<String> = columns
            .iter()
            .map(|column| {
                let mut definition = format!(
                    "    {} {}",
                    quote_ident(&column.name),
                    column.formatted_type
                );
                definition.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
                if let Some(default) = column
                    .metadata
                    .as_ref()
                    .and_then(|m| m.get("default"))
                    .and_then(Value::as_str)
                {
                    definition.push_str(" DEFAULT ");
                    definition.push_str(default);
                }
                definition
            })
            .collect();

        let primary_keys: Vec<String> = columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| quote_ident(&c.name))
            .collect();
        if !primary_keys.is_empty() {
            definitions.push(format!(
                "    CONSTRAINT {} PRIMARY KEY ({})",
                quote_ident(&format!("PK_{}", name)),
                primary_keys.join(", ")
            ));
        }

        let mut script = format!(
            "CREATE TABLE {} (\n{}\n);",
            quote_ident(&name),
            definitions.join(",\n")
        );

        for constraint in self.foreign_keys(&schema, &name)? {
            script.push_str(&format!(
                "\nALTER TABLE {} ADD {};",
                quote_ident(&name),
                constraint
            ));
        }

        for statement in self.index_statements(&schema, &name)? {
            let statement = statement.trim().trim_end_matches(';');
            script.push('\n');
            script.push_str(statement);
            script.push(';');
        }

        Ok(script)
    }
}

/// Table names as listed: bare, or `schema.table` when the bare name is
/// used by more than one schema. Sorted.
fn catalog_names(found: Vec<(String, String)>) -> Vec<String> {
    let mut names: Vec<String> = found
        .iter()
        .map(|(schema, table)| {
            let shared = found.iter().filter(|(_, other)| other == table).count() > 1;
            if shared {
                format!("{}.{}", schema, table)
            } else {
                table.clone()
            }
        })
        .collect();
    names.sort();
    names
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// libpq/mysql style `key='value'` connection string, skipping empty values
fn key_value_string(pairs: &[(&str, &String)]) -> String {
    pairs
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| {
            let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
            format!("{}='{}'", key, escaped)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// NaN and infinities have no JSON form and are treated as null
fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Exact DECIMAL text, as a JSON number only when `f64` shows the same value
fn decimal_value(text: String) -> Value {
    let normalized = if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text.as_str()
    };
    match normalized.parse::<f64>() {
        Ok(f) if f.is_finite() && f.to_string() == normalized => float_value(f),
        _ => Value::String(text),
    }
}

/// MAP keys become JSON object keys
fn map_key(key: DuckValue) -> String {
    match to_json(key) {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Convert a fetched DuckDB value to JSON
fn to_json(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(i) => Value::from(i),
        DuckValue::SmallInt(i) => Value::from(i),
        DuckValue::Int(i) => Value::from(i),
        DuckValue::BigInt(i) => Value::from(i),
        DuckValue::HugeInt(i) => i64::try_from(i)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(i.to_string())),
        DuckValue::UTinyInt(i) => Value::from(i),
        DuckValue::USmallInt(i) => Value::from(i),
        DuckValue::UInt(i) => Value::from(i),
        DuckValue::UBigInt(i) => Value::from(i),
        DuckValue::Float(f) => float_value(f as f64),
        DuckValue::Double(f) => float_value(f),
        DuckValue::Decimal(d) => decimal_value(d.to_string()),
        DuckValue::Text(s) => Value::String(s),
        DuckValue::Enum(s) => Value::String(s),
        DuckValue::Blob(b) => Value::String(format!("<blob:{} bytes>", b.len())),
        DuckValue::Date32(days) => days
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or_else(|| Value::String(days.to_string())),
        DuckValue::Timestamp(unit, ts) => {
            let micros = to_micros(unit, ts);
            DateTime::<Utc>::from_timestamp(
                micros.div_euclid(1_000_000),
                (micros.rem_euclid(1_000_000) * 1_000) as u32,
            )
            .map(|dt| Value::String(dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string()))
            .unwrap_or_else(|| Value::String(ts.to_string()))
        }
        DuckValue::Time64(unit, t) => {
            let micros = to_micros(unit, t);
            NaiveTime::from_num_seconds_from_midnight_opt(
                (micros / 1_000_000) as u32,
                ((micros % 1_000_000) * 1_000) as u32,
            )
            .map(|time| Value::String(time.format("%H:%M:%S%.f").to_string()))
            .unwrap_or_else(|| Value::String(t.to_string()))
        }
        DuckValue::Interval {
            months,
            days,
            nanos,
        } => Value::String(format!("P{}M{}DT{}S", months, days, nanos as f64 / 1e9)),
        DuckValue::List(items) | DuckValue::Array(items) => {
            Value::Array(items.into_iter().map(to_json).collect())
        }
        DuckValue::Struct(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), to_json(value.clone())))
                .collect(),
        ),
        DuckValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, value)| (map_key(key.clone()), to_json(value.clone())))
                .collect(),
        ),
        DuckValue::Union(inner) => to_json(*inner),
        other => Value::String(format!("{:?}", other)),
    }
}
