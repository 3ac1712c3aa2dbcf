//! Recursive structural diff of nested values
//!
//! Both the schema comparator (column metadata) and the data comparator
//! (structured cell values) need to explain *where* inside a nested value two
//! sides disagree. This module walks two `serde_json::Value`s in lockstep and
//! records path-qualified changes:
//!
//! - mapping vs mapping: keys only on one side are reported as added/removed,
//!   shared keys recurse;
//! - sequence vs sequence: shared positions recurse, positions beyond the
//!   shorter side are reported as added/removed;
//! - anything else: compared by value, a mismatch is a change at that path.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Rendering of a null value in human-readable differences
pub const NULL_SENTINEL: &str = "NULL";

/// Rendering of a side that has no entry at all at a nested path
pub const ABSENT_SENTINEL: &str = "N/A";

/// One step into a nested value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a nested value, rendered as `root['key'][0]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuePath {
    pub root: String,
    pub segments: Vec<PathSegment>,
}

impl ValuePath {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            segments: Vec::new(),
        }
    }

    fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self {
            root: self.root.clone(),
            segments,
        }
    }

    /// True when the path points at the root value itself
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => write!(f, "['{}']", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// A single difference found by [`structural_diff`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralChange {
    Changed {
        path: ValuePath,
        source: Value,
        target: Value,
    },
    Added {
        path: ValuePath,
        value: Value,
    },
    Removed {
        path: ValuePath,
        value: Value,
    },
}

impl StructuralChange {
    pub fn path(&self) -> &ValuePath {
        match self {
            Self::Changed { path, .. } | Self::Added { path, .. } | Self::Removed { path, .. } => {
                path
            }
        }
    }
}

/// Diff two values of unknown shape, rooting every reported path at `root`
pub fn structural_diff(root: &str, source: &Value, target: &Value) -> Vec<StructuralChange> {
    let mut changes = Vec::new();
    diff_into(&ValuePath::new(root), source, target, &mut changes);
    changes
}

fn diff_into(path: &ValuePath, source: &Value, target: &Value, out: &mut Vec<StructuralChange>) {
    match (source, target) {
        (Value::Object(left), Value::Object(right)) => {
            for (key, left_value) in left {
                let child = path.child(PathSegment::Key(key.clone()));
                match right.get(key) {
                    Some(right_value) => diff_into(&child, left_value, right_value, out),
                    None => out.push(StructuralChange::Removed {
                        path: child,
                        value: left_value.clone(),
                    }),
                }
            }
            for (key, right_value) in right {
                if !left.contains_key(key) {
                    out.push(StructuralChange::Added {
                        path: path.child(PathSegment::Key(key.clone())),
                        value: right_value.clone(),
                    });
                }
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            let shared = left.len().min(right.len());
            for index in 0..shared {
                diff_into(
                    &path.child(PathSegment::Index(index)),
                    &left[index],
                    &right[index],
                    out,
                );
            }
            for (index, value) in left.iter().enumerate().skip(shared) {
                out.push(StructuralChange::Removed {
                    path: path.child(PathSegment::Index(index)),
                    value: value.clone(),
                });
            }
            for (index, value) in right.iter().enumerate().skip(shared) {
                out.push(StructuralChange::Added {
                    path: path.child(PathSegment::Index(index)),
                    value: value.clone(),
                });
            }
        }
        _ => {
            if !values_equal(source, target) {
                out.push(StructuralChange::Changed {
                    path: path.clone(),
                    source: source.clone(),
                    target: target.clone(),
                });
            }
        }
    }
}

/// Strict value equality without string/number coercion.
///
/// Numbers compare by numeric value, so an integer and a float holding the
/// same quantity are equal; a string is never equal to a number.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x == y;
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x == y;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, l)| y.get(key).map_or(false, |r| values_equal(l, r)))
        }
        _ => a == b,
    }
}

/// Render a value for a human-readable difference entry.
///
/// Null becomes [`NULL_SENTINEL`], strings are shown without quotes and
/// everything else uses its JSON text.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => NULL_SENTINEL.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// True for mappings and sequences
pub fn is_structured(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}
