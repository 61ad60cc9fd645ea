//! Document snapshots and textual diff statistics
//!
//! A document exists in two snapshots during one patch attempt: *old* (as
//! last known to the project model) and *new* (freshly read text). Neither
//! snapshot outlives the attempt.

use std::path::{Path, PathBuf};

/// One source unit at a single point in time, identified by its stable path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    /// Stable path identifying the source unit
    pub path: PathBuf,

    /// Full text of the document at snapshot time
    pub text: String,
}

impl DocumentSnapshot {
    /// Create a snapshot from a path and its text
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Path of the source unit
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of lines in the snapshot
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

/// Line-level statistics of a textual change.
///
/// Computed purely for diagnostics and logging; correctness of a patch
/// attempt never depends on these numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextDiffStats {
    /// Lines present only in the old snapshot
    pub lines_removed: usize,

    /// Lines present only in the new snapshot
    pub lines_added: usize,

    /// Lines shared by both snapshots (common prefix + common suffix)
    pub lines_unchanged: usize,
}

impl TextDiffStats {
    /// Compare two snapshots line by line.
    ///
    /// Uses a common prefix/suffix scan: everything between the shared ends
    /// counts as removed/added. Good enough for log output, not a real diff.
    pub fn between(old: &DocumentSnapshot, new: &DocumentSnapshot) -> Self {
        let old_lines: Vec<&str> = old.text.lines().collect();
        let new_lines: Vec<&str> = new.text.lines().collect();

        let prefix = old_lines
            .iter()
            .zip(new_lines.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let max_suffix = old_lines.len().min(new_lines.len()) - prefix;
        let suffix = old_lines
            .iter()
            .rev()
            .zip(new_lines.iter().rev())
            .take_while(|(a, b)| a == b)
            .take(max_suffix)
            .count();

        Self {
            lines_removed: old_lines.len() - prefix - suffix,
            lines_added: new_lines.len() - prefix - suffix,
            lines_unchanged: prefix + suffix,
        }
    }

    /// True when both snapshots hold identical line content
    pub fn is_unchanged(&self) -> bool {
        self.lines_removed == 0 && self.lines_added == 0
    }
}
