//! Column descriptors shared by the data sources and the comparators

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized description of one table column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: String,
    /// Type rendered with its length/precision/scale, e.g. `decimal(10,2)`
    pub formatted_type: String,
    pub max_length: Option<i64>,
    pub numeric_precision: Option<i64>,
    pub numeric_scale: Option<i64>,
    pub nullable: bool,
    pub identity: bool,
    pub primary_key: bool,
    /// Extended attributes of arbitrary shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ColumnDescriptor {
    /// Build a descriptor, deriving `formatted_type` from the raw type fields
    pub fn new(
        name: impl Into<String>,
        data_type: impl Into<String>,
        max_length: Option<i64>,
        numeric_precision: Option<i64>,
        numeric_scale: Option<i64>,
    ) -> Self {
        let data_type = data_type.into();
        let formatted_type =
            format_data_type(&data_type, max_length, numeric_precision, numeric_scale);

        Self {
            name: name.into(),
            data_type,
            formatted_type,
            max_length,
            numeric_precision,
            numeric_scale,
            nullable: true,
            identity: false,
            primary_key: false,
            metadata: None,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn identity(mut self, identity: bool) -> Self {
        self.identity = identity;
        self
    }

    pub fn primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Render a column type the way it appears in a DDL script.
///
/// Character types carry their length (`MAX` when unbounded or unknown),
/// exact numerics carry precision and scale, everything else is the bare
/// lower-cased type name.
pub fn format_data_type(
    data_type: &str,
    max_length: Option<i64>,
    numeric_precision: Option<i64>,
    numeric_scale: Option<i64>,
) -> String {
    let lowered = data_type.trim().to_lowercase();
    // Some engines report "decimal(10,2)" as the type name itself
    let base = lowered.split('(').next().unwrap_or("").trim().to_string();

    match base.as_str() {
        "varchar" | "nvarchar" | "char" | "nchar" => match max_length {
            Some(len) if len >= 0 => format!("{}({})", base, len),
            _ => format!("{}(MAX)", base),
        },
        "decimal" | "numeric" => match (numeric_precision, numeric_scale) {
            (Some(p), Some(s)) => format!("{}({},{})", base, p, s),
            (Some(p), None) => format!("{}({},0)", base, p),
            _ => lowered,
        },
        _ => lowered,
    }
}

/// Render a boolean column flag the way schema differences report it
pub fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}
