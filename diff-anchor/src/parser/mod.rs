//! Unified-diff hunk parser.
//!
//! Features:
//! - Only `@@` headers are required; anything before the first header
//!   (`diff --git`, `---`/`+++`, stray text) is ignored.
//! - Malformed `@@` lines are skipped without touching the line counter.
//! - `\ No newline at end of file` markers are kept as non-addressable lines.
//! - Never fails: unparseable input yields an empty or partial `FileDiff`.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::types::{DiffLine, FileDiff, Hunk, LineKind};

lazy_static! {
    static ref HUNK_HEADER: Regex =
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("valid hunk regex");
}

/// New-side `(start, count)` of a hunk header, or `None` if it does not match.
pub fn parse_hunk_header(line: &str) -> Option<(u32, u32)> {
    let caps = HUNK_HEADER.captures(line)?;
    let start = caps.get(3)?.as_str().parse().ok()?;
    let count = match caps.get(4) {
        Some(m) => m.as_str().parse().ok()?,
        None => 1,
    };
    Some((start, count))
}

/// Decode raw diff bytes, replacing invalid UTF-8 sequences.
pub fn decode_diff_bytes(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// One physical line of a file's diff, classified in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocLine<'a> {
    /// Text before the first valid hunk header (`diff --git`, `---`, `+++`).
    Prelude(&'a str),
    /// Any `@@` line. `new_range` is `None` for malformed headers.
    Header {
        raw: &'a str,
        new_range: Option<(u32, u32)>,
    },
    /// A line inside a hunk.
    Body(DiffLine),
}

/// Streaming classifier shared by the parser and the combiner so both agree
/// on every line's kind and new-file number.
pub struct DocumentWalker<'a> {
    lines: std::str::Lines<'a>,
    in_hunk: bool,
    new_line: u32,
}

impl<'a> DocumentWalker<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            lines: raw.lines(),
            in_hunk: false,
            new_line: 0,
        }
    }
}

impl<'a> Iterator for DocumentWalker<'a> {
    type Item = DocLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.next()?;

        if line.starts_with("@@") {
            let new_range = parse_hunk_header(line);
            if let Some((start, _)) = new_range {
                self.in_hunk = true;
                self.new_line = start.saturating_sub(1);
            }
            return Some(DocLine::Header {
                raw: line,
                new_range,
            });
        }

        if !self.in_hunk {
            return Some(DocLine::Prelude(line));
        }

        let parsed = if line.starts_with('+') {
            self.new_line += 1;
            DiffLine {
                kind: LineKind::Added,
                raw: line.to_string(),
                new_line: Some(self.new_line),
            }
        } else if line.starts_with('-') {
            DiffLine {
                kind: LineKind::Removed,
                raw: line.to_string(),
                new_line: None,
            }
        } else if line.starts_with('\\') {
            DiffLine {
                kind: LineKind::NoNewline,
                raw: line.to_string(),
                new_line: None,
            }
        } else {
            // A leading space is the context convention; anything else is
            // treated as context too.
            self.new_line += 1;
            DiffLine {
                kind: LineKind::Context,
                raw: line.to_string(),
                new_line: Some(self.new_line),
            }
        };
        Some(DocLine::Body(parsed))
    }
}

/// Parses the unified diff of one file into typed hunks.
pub fn parse_file_diff(path: &str, raw: &str) -> FileDiff {
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut skipped_prelude = 0usize;

    for doc_line in DocumentWalker::new(raw) {
        match doc_line {
            DocLine::Prelude(_) => skipped_prelude += 1,
            DocLine::Header {
                new_range: Some((start, count)),
                ..
            } => hunks.push(Hunk {
                new_start: start,
                new_count: count,
                lines: Vec::new(),
            }),
            DocLine::Header {
                raw,
                new_range: None,
            } => warn!("parser: malformed hunk header in {}: {:?}", path, raw),
            DocLine::Body(line) => {
                if let Some(h) = hunks.last_mut() {
                    h.lines.push(line);
                }
            }
        }
    }

    debug!(
        "parser: {} hunks={} prelude_skipped={}",
        path,
        hunks.len(),
        skipped_prelude
    );
    FileDiff {
        path: path.to_string(),
        hunks,
    }
}

/// Simple heuristic to detect binary patches or messages in unified diff.
pub fn looks_like_binary_patch(s: &str) -> bool {
    s.contains("GIT binary patch")
        || s.starts_with("Binary files ")
        || (s.starts_with("Files ") && s.contains(" differ"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = "@@ -1,3 +1,4 @@\n+fn a() {\n-fn b() {\n println!(x);\n}\n";

    #[test]
    fn scenario_lines_carry_new_file_numbers() {
        let fd = parse_file_diff("a.rs", SCENARIO);
        assert_eq!(fd.hunks.len(), 1);
        let got: Vec<(LineKind, Option<u32>)> =
            fd.lines().map(|l| (l.kind, l.new_line)).collect();
        assert_eq!(
            got,
            vec![
                (LineKind::Added, Some(1)),
                (LineKind::Removed, None),
                (LineKind::Context, Some(2)),
                (LineKind::Context, Some(3)),
            ]
        );
    }

    #[test]
    fn header_without_count_means_one() {
        assert_eq!(parse_hunk_header("@@ -3 +7 @@"), Some((7, 1)));
        assert_eq!(parse_hunk_header("@@ -3,2 +7,5 @@ fn x()"), Some((7, 5)));
        assert_eq!(parse_hunk_header("@@ garbage @@"), None);
    }

    #[test]
    fn counter_resets_at_each_header() {
        let raw = "@@ -1,2 +1,2 @@\n a\n+b\n@@ -10,2 +20,2 @@\n c\n+d\n";
        let fd = parse_file_diff("x", raw);
        assert_eq!(fd.hunks.len(), 2);
        let lines: Vec<Option<u32>> = fd.lines().map(|l| l.new_line).collect();
        assert_eq!(lines, vec![Some(1), Some(2), Some(20), Some(21)]);
        assert_eq!(fd.hunks[1].new_start, 20);
        assert_eq!(fd.hunks[1].new_count, 2);
    }

    #[test]
    fn prelude_and_malformed_headers_are_skipped() {
        let raw = "diff --git a/x b/x\n--- a/x\n+++ b/x\n@@ broken @@\n@@ -1 +5 @@\n+new\n";
        let fd = parse_file_diff("x", raw);
        assert_eq!(fd.hunks.len(), 1);
        let only: Vec<&DiffLine> = fd.lines().collect();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].new_line, Some(5));
        assert_eq!(only[0].content(), "new");
    }

    #[test]
    fn malformed_header_inside_hunk_keeps_counting() {
        let raw = "@@ -1,3 +1,3 @@\n a\n@@ nope\n b\n";
        let fd = parse_file_diff("x", raw);
        let lines: Vec<Option<u32>> = fd.lines().map(|l| l.new_line).collect();
        assert_eq!(lines, vec![Some(1), Some(2)]);
    }

    #[test]
    fn headerless_input_is_empty() {
        let fd = parse_file_diff("x", "+just\n-text\n");
        assert!(fd.is_empty());
        assert!(parse_file_diff("x", "").is_empty());
    }

    #[test]
    fn no_newline_marker_is_not_addressable() {
        let raw = "@@ -1 +1 @@\n-old\n\\ No newline at end of file\n+new\n";
        let fd = parse_file_diff("x", raw);
        let kinds: Vec<LineKind> = fd.lines().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![LineKind::Removed, LineKind::NoNewline, LineKind::Added]
        );
        assert_eq!(fd.lines().last().and_then(|l| l.new_line), Some(1));
    }

    #[test]
    fn added_and_context_rebuild_new_content() {
        let raw = "@@ -4,3 +4,4 @@\n keep\n-gone\n+one\n+two\n tail\n";
        let fd = parse_file_diff("x", raw);
        let rebuilt: Vec<&str> = fd
            .lines()
            .filter(|l| l.is_addressable())
            .map(|l| l.content())
            .collect();
        assert_eq!(rebuilt, vec!["keep", "one", "two", "tail"]);
        let numbers: Vec<u32> = fd.lines().filter_map(|l| l.new_line).collect();
        assert_eq!(numbers, vec![4, 5, 6, 7]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let text = decode_diff_bytes(b"@@ -1 +1 @@\n+ok \xff\n");
        let fd = parse_file_diff("x", &text);
        assert_eq!(fd.lines().count(), 1);
        assert!(fd.lines().next().unwrap().raw.contains('\u{FFFD}'));
    }

    #[test]
    fn binary_patch_detection() {
        assert!(looks_like_binary_patch("Binary files a/x and b/x differ"));
        assert!(!looks_like_binary_patch("@@ -1 +1 @@\n+x\n"));
    }
}
