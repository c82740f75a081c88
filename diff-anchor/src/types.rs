//! Diff data model shared by the parser, the resolver and the combiner.
//!
//! A `FileDiff` is built fresh for every review run and never mutated after
//! the parser returns it.

use serde::{Deserialize, Serialize};

/// Kind of one body line inside a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineKind {
    /// Unchanged line, present in both versions.
    Context,
    /// Line present only in the new version (`+`).
    Added,
    /// Line present only in the old version (`-`).
    Removed,
    /// `\ No newline at end of file`. Transmitted, never addressable.
    NoNewline,
}

/// One body line of a hunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: LineKind,
    /// Line exactly as it appeared in the diff, marker included.
    pub raw: String,
    /// 1-based line number in the new file. Set for Context/Added only.
    pub new_line: Option<u32>,
}

impl DiffLine {
    /// Line text without the leading diff marker.
    pub fn content(&self) -> &str {
        match self.kind {
            LineKind::Added | LineKind::Removed | LineKind::NoNewline => {
                self.raw.get(1..).unwrap_or("")
            }
            LineKind::Context => self.raw.strip_prefix(' ').unwrap_or(&self.raw),
        }
    }

    /// True for lines that exist in the new file and can carry a comment.
    pub fn is_addressable(&self) -> bool {
        matches!(self.kind, LineKind::Context | LineKind::Added)
    }
}

/// A diff hunk (continuous block of changes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub new_start: u32,
    /// Declared new-side length; 1 when the header omits the count.
    pub new_count: u32,
    pub lines: Vec<DiffLine>,
}

/// Parsed diff of a single file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub path: String,
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    /// Empty diffs have no addressable lines at all.
    pub fn is_empty(&self) -> bool {
        self.hunks.iter().all(|h| h.lines.is_empty())
    }

    /// All body lines in document order.
    pub fn lines(&self) -> impl Iterator<Item = &DiffLine> {
        self.hunks.iter().flat_map(|h| h.lines.iter())
    }
}
