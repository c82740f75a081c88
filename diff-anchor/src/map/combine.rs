//! Diff combiner: many files' diffs → one numbered document + position map.
//!
//! Layout of the document shown to the model:
//!
//! ```text
//! ## File: src/a.rs
//!    1 | @@ -1,3 +1,4 @@
//!    2 | +fn a() {
//!    3 | -fn b() {
//!
//! ## File: src/b.rs
//!    1 | @@ -10,2 +10,3 @@
//! ```
//!
//! Display numbers are file-local: the heading is not numbered and every
//! following line (headers included) takes the next number, starting at 1.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use super::resolve::resolve;
use crate::parser::{DocLine, DocumentWalker, looks_like_binary_patch, parse_file_diff};
use crate::types::FileDiff;

/// Prefix of the file-boundary heading line.
pub const FILE_HEADING_PREFIX: &str = "## File: ";

/// Where a display line points inside its file's diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Anchor {
    /// Diff position for the comment sink.
    pub position: u32,
    /// Line number in the new file version.
    pub new_line: u32,
}

/// `(path, display line) → anchor` for every addressable line.
///
/// Built once per `combine` call; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct PositionMap {
    files: HashMap<String, BTreeMap<u32, Anchor>>,
}

impl PositionMap {
    /// Diff position for a display line, `None` if the line is not addressable.
    pub fn position(&self, path: &str, display_line: u32) -> Option<u32> {
        self.anchor(path, display_line).map(|a| a.position)
    }

    pub fn anchor(&self, path: &str, display_line: u32) -> Option<Anchor> {
        self.files.get(path)?.get(&display_line).copied()
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Ordered `(display line, anchor)` pairs of one file.
    pub fn entries_for<'a>(&'a self, path: &str) -> impl Iterator<Item = (u32, Anchor)> + 'a {
        self.files
            .get(path)
            .into_iter()
            .flat_map(|m| m.iter().map(|(d, a)| (*d, *a)))
    }

    /// Total number of addressable display lines across all files.
    pub fn len(&self) -> usize {
        self.files.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One file's slice of the combined document.
#[derive(Debug, Clone)]
pub struct FileSection {
    pub path: String,
    /// Parsed diff, kept for direct resolver calls.
    pub diff: FileDiff,
    /// Number of display lines emitted for this file.
    pub display_lines: u32,
}

/// Result of combining several files' diffs.
#[derive(Debug, Clone, Default)]
pub struct CombinedDiff {
    /// Numbered document shown to the model.
    pub text: String,
    /// Sections in caller order.
    pub sections: Vec<FileSection>,
    pub positions: PositionMap,
}

impl CombinedDiff {
    /// Parsed diff of `path`, if it took part in the combination.
    pub fn file(&self, path: &str) -> Option<&FileDiff> {
        self.sections.iter().find(|s| s.path == path).map(|s| &s.diff)
    }

    /// Position for a display line (what the model references).
    pub fn position_for_display(&self, path: &str, display_line: u32) -> Option<u32> {
        self.positions.position(path, display_line)
    }

    /// Position for a new-file line number (bypasses the display numbering).
    pub fn position_for_new_line(&self, path: &str, new_line: u32) -> Option<u32> {
        self.file(path).and_then(|fd| resolve(fd, new_line))
    }
}

/// Render a numbered document line.
pub fn render_display_line(display: u32, raw: &str) -> String {
    format!("{:>4} | {}", display, raw)
}

/// Combine per-file diffs (caller order preserved) into one addressable document.
pub fn combine<I, P, D>(files: I) -> CombinedDiff
where
    I: IntoIterator<Item = (P, D)>,
    P: AsRef<str>,
    D: AsRef<str>,
{
    let mut out = CombinedDiff::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (path, raw) in files {
        let path = path.as_ref();
        let raw = raw.as_ref();

        if !seen.insert(path.to_string()) {
            warn!("combine: duplicate path {} skipped", path);
            continue;
        }

        if !out.text.is_empty() {
            out.text.push('\n');
        }
        out.text.push_str(FILE_HEADING_PREFIX);
        out.text.push_str(path);
        out.text.push('\n');

        if looks_like_binary_patch(raw) {
            debug!("combine: binary patch {} has no addressable lines", path);
            out.sections.push(FileSection {
                path: path.to_string(),
                diff: FileDiff {
                    path: path.to_string(),
                    hunks: Vec::new(),
                },
                display_lines: 0,
            });
            continue;
        }

        let mut display_line = 0u32;
        let mut position = 0u32;
        let mut anchors: BTreeMap<u32, Anchor> = BTreeMap::new();

        for doc_line in DocumentWalker::new(raw) {
            display_line += 1;
            let text = match &doc_line {
                DocLine::Prelude(s) => *s,
                DocLine::Header { raw, .. } => *raw,
                DocLine::Body(line) => {
                    position += 1;
                    if let (true, Some(new_line)) = (line.is_addressable(), line.new_line) {
                        anchors.insert(display_line, Anchor { position, new_line });
                    }
                    line.raw.as_str()
                }
            };
            out.text.push_str(&render_display_line(display_line, text));
            out.text.push('\n');
        }

        debug!(
            "combine: {} display_lines={} addressable={}",
            path,
            display_line,
            anchors.len()
        );
        out.positions.files.insert(path.to_string(), anchors);
        out.sections.push(FileSection {
            path: path.to_string(),
            diff: parse_file_diff(path, raw),
            display_lines: display_line,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIFF_A: &str = "@@ -1,3 +1,4 @@\n+fn a() {\n-fn b() {\n println!(x);\n}\n";
    const DIFF_B: &str = "@@ -10,2 +10,3 @@\n ctx\n+added\n-removed\n";

    fn lines_after_heading<'a>(text: &'a str, path: &str) -> Vec<&'a str> {
        let heading = format!("{FILE_HEADING_PREFIX}{path}");
        text.lines()
            .skip_while(|l| *l != heading)
            .skip(1)
            .take_while(|l| !l.is_empty())
            .collect()
    }

    #[test]
    fn numbering_resets_per_file() {
        let c = combine([("a.rs", DIFF_A), ("b.rs", DIFF_B)]);
        let b = lines_after_heading(&c.text, "b.rs");
        assert_eq!(b[0], "   1 | @@ -10,2 +10,3 @@");
        assert_eq!(b[1], "   2 |  ctx");
        let a = lines_after_heading(&c.text, "a.rs");
        assert_eq!(a.len(), 5);
        assert_eq!(c.sections[0].display_lines, 5);
    }

    #[test]
    fn display_lines_map_to_positions() {
        let c = combine([("a.rs", DIFF_A), ("b.rs", DIFF_B)]);
        // a.rs: 1 header, 2 +fn a, 3 -fn b, 4 println, 5 }
        assert_eq!(c.position_for_display("a.rs", 1), None);
        assert_eq!(c.position_for_display("a.rs", 2), Some(1));
        assert_eq!(c.position_for_display("a.rs", 3), None);
        assert_eq!(c.position_for_display("a.rs", 4), Some(3));
        assert_eq!(c.position_for_display("a.rs", 5), Some(4));
        // b.rs: 1 header, 2 ctx, 3 +added, 4 -removed
        assert_eq!(c.position_for_display("b.rs", 3), Some(2));
        assert_eq!(c.position_for_display("b.rs", 4), None);
        assert_eq!(c.positions.len(), 5);
    }

    #[test]
    fn map_round_trips_through_resolver() {
        let multi = "diff --git a/m b/m\n--- a/m\n+++ b/m\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n\
                     @@ -30,3 +30,4 @@\n x\n+y\n+z\n-w\n\\ No newline at end of file\n";
        let c = combine([("a.rs", DIFF_A), ("m.rs", multi), ("b.rs", DIFF_B)]);
        for section in &c.sections {
            for (_, anchor) in c.positions.entries_for(&section.path) {
                assert_eq!(resolve(&section.diff, anchor.new_line), Some(anchor.position));
            }
        }
        assert_eq!(c.position_for_new_line("m.rs", 31), Some(6));
    }

    #[test]
    fn prelude_is_numbered_but_not_addressable() {
        let raw = "--- a/x\n+++ b/x\n@@ -1 +1 @@\n+x\n";
        let c = combine([("x", raw)]);
        assert_eq!(c.position_for_display("x", 1), None);
        assert_eq!(c.position_for_display("x", 2), None);
        assert_eq!(c.position_for_display("x", 4), Some(1));
    }

    #[test]
    fn duplicates_and_binaries_are_skipped() {
        let c = combine([
            ("a.rs", DIFF_A),
            ("a.rs", DIFF_B),
            ("img.png", "Binary files a/img.png and b/img.png differ"),
        ]);
        assert_eq!(c.sections.len(), 2);
        assert!(c.file("img.png").is_some_and(FileDiff::is_empty));
        assert!(!c.positions.contains_file("img.png"));
        assert!(c.text.contains("## File: img.png"));
    }

    #[test]
    fn unknown_file_has_no_position() {
        let c = combine([("a.rs", DIFF_A)]);
        assert_eq!(c.position_for_display("nope.rs", 2), None);
        assert_eq!(c.position_for_new_line("nope.rs", 1), None);
    }
}
