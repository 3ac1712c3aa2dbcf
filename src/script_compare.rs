//! Unified line diff of two DDL scripts

use difference::{Changeset, Difference};
use serde::{Deserialize, Serialize};

/// Lines of unchanged context kept around each change
pub const CONTEXT_LINES: usize = 3;

pub const SOURCE_LABEL: &str = "Source Database";
pub const TARGET_LABEL: &str = "Target Database";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffLineRole {
    Added,
    Removed,
    Header,
    FileHeader,
    Context,
}

/// One line of unified diff output, tagged with what it represents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub role: DiffLineRole,
    pub text: String,
}

impl DiffLine {
    fn new(role: DiffLineRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDiffResult {
    pub has_differences: bool,
    pub diff_lines: Vec<DiffLine>,
    pub source_script: String,
    pub target_script: String,
}

impl ScriptDiffResult {
    /// The diff as plain unified-diff text
    pub fn unified_text(&self) -> String {
        self.diff_lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Per-line edit operation, indices into the source and target line lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineOp {
    Equal(usize, usize),
    Delete(usize),
    Insert(usize),
}

impl LineOp {
    fn is_change(&self) -> bool {
        !matches!(self, LineOp::Equal(..))
    }
}

/// Compare two scripts line by line and produce a unified diff.
///
/// Identical scripts (including two empty scripts) produce no lines at all.
pub fn compare_scripts(source_script: &str, target_script: &str) -> ScriptDiffResult {
    let source_lines: Vec<&str> = source_script.lines().collect();
    let target_lines: Vec<&str> = target_script.lines().collect();

    let ops = line_ops(&source_lines, &target_lines);
    let diff_lines = unified_lines(&ops, &source_lines, &target_lines);

    ScriptDiffResult {
        has_differences: !diff_lines.is_empty(),
        diff_lines,
        source_script: source_script.to_string(),
        target_script: target_script.to_string(),
    }
}

fn line_ops(source: &[&str], target: &[&str]) -> Vec<LineOp> {
    if source.is_empty() {
        return (0..target.len()).map(LineOp::Insert).collect();
    }
    if target.is_empty() {
        return (0..source.len()).map(LineOp::Delete).collect();
    }

    let Changeset { diffs, .. } = Changeset::new(&source.join("\n"), &target.join("\n"), "\n");

    let mut ops = Vec::with_capacity(source.len().max(target.len()));
    let (mut i, mut j) = (0, 0);
    for diff in &diffs {
        match diff {
            Difference::Same(chunk) => {
                for _ in chunk.split('\n') {
                    ops.push(LineOp::Equal(i, j));
                    i += 1;
                    j += 1;
                }
            }
            Difference::Rem(chunk) => {
                for _ in chunk.split('\n') {
                    ops.push(LineOp::Delete(i));
                    i += 1;
                }
            }
            Difference::Add(chunk) => {
                for _ in chunk.split('\n') {
                    ops.push(LineOp::Insert(j));
                    j += 1;
                }
            }
        }
    }

    if i != source.len() || j != target.len() {
        log::warn!(
            "Line diff did not cover both scripts ({}/{} source, {}/{} target lines), replacing whole script",
            i,
            source.len(),
            j,
            target.len()
        );
        return (0..source.len())
            .map(LineOp::Delete)
            .chain((0..target.len()).map(LineOp::Insert))
            .collect();
    }

    // Within a run of changes, removals come before additions
    let mut run_start = 0;
    while run_start < ops.len() {
        let run_end = ops[run_start..]
            .iter()
            .position(|op| !op.is_change())
            .map_or(ops.len(), |len| run_start + len);
        ops[run_start..run_end].sort_by_key(|op| matches!(op, LineOp::Insert(_)));
        run_start = run_end + 1;
    }

    ops
}

/// Group ops into hunks of changes with surrounding context.
///
/// Changes separated by more than twice the context size start a new hunk.
/// Returns half-open ranges into `ops`.
fn hunk_ranges(ops: &[LineOp]) -> Vec<(usize, usize)> {
    let changes: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| op.is_change())
        .map(|(idx, _)| idx)
        .collect();

    let Some((&first, rest)) = changes.split_first() else {
        return Vec::new();
    };

    let mut ranges = Vec::new();
    let mut start = first.saturating_sub(CONTEXT_LINES);
    let mut last = first;

    for &idx in rest {
        // everything between two change ops is an equal line
        if idx - last - 1 > 2 * CONTEXT_LINES {
            ranges.push((start, last + 1 + CONTEXT_LINES));
            start = idx - CONTEXT_LINES;
        }
        last = idx;
    }
    ranges.push((start, (last + 1 + CONTEXT_LINES).min(ops.len())));

    ranges
}

/// Classic unified range: `start` alone for one line, `start-1,0` when empty
fn format_range(start: usize, length: usize) -> String {
    match length {
        1 => format!("{}", start + 1),
        0 => format!("{},0", start),
        _ => format!("{},{}", start + 1, length),
    }
}

fn unified_lines(ops: &[LineOp], source: &[&str], target: &[&str]) -> Vec<DiffLine> {
    let ranges = hunk_ranges(ops);
    if ranges.is_empty() {
        return Vec::new();
    }

    // Source/target line counts consumed before each op
    let mut positions = Vec::with_capacity(ops.len() + 1);
    let (mut i, mut j) = (0, 0);
    for op in ops {
        positions.push((i, j));
        match op {
            LineOp::Equal(..) => {
                i += 1;
                j += 1;
            }
            LineOp::Delete(_) => i += 1,
            LineOp::Insert(_) => j += 1,
        }
    }
    positions.push((i, j));

    let mut lines = vec![
        DiffLine::new(DiffLineRole::FileHeader, format!("--- {}", SOURCE_LABEL)),
        DiffLine::new(DiffLineRole::FileHeader, format!("+++ {}", TARGET_LABEL)),
    ];

    for (start, end) in ranges {
        let (source_start, target_start) = positions[start];
        let (source_end, target_end) = positions[end];

        lines.push(DiffLine::new(
            DiffLineRole::Header,
            format!(
                "@@ -{} +{} @@",
                format_range(source_start, source_end - source_start),
                format_range(target_start, target_end - target_start)
            ),
        ));

        for op in &ops[start..end] {
            lines.push(match *op {
                LineOp::Equal(i, _) => {
                    DiffLine::new(DiffLineRole::Context, format!(" {}", source[i]))
                }
                LineOp::Delete(i) => {
                    DiffLine::new(DiffLineRole::Removed, format!("-{}", source[i]))
                }
                LineOp::Insert(j) => DiffLine::new(DiffLineRole::Added, format!("+{}", target[j])),
            });
        }
    }

    lines
}
