//! Call-site detection on added lines.
//!
//! Best-effort: any identifier directly followed by `(` on an added line
//! counts as a call. False positives only cost a wasted lookup.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::map::FILE_HEADING_PREFIX;

lazy_static! {
    static ref CALL_SITE: Regex = Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\(").expect("valid call regex");
    static ref DISPLAY_PREFIX: Regex = Regex::new(r"^\s*\d+ \| ").expect("valid display regex");
}

/// Control-flow words that look like calls (`if (x)`, `while(...)`).
const NOT_CALLS: &[&str] = &[
    "if", "for", "while", "match", "switch", "return", "catch", "sizeof", "fn", "function", "def",
    "func",
];

/// Strip the `   7 | ` display prefix of a combined-document line.
fn strip_display_prefix(line: &str) -> &str {
    match DISPLAY_PREFIX.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// True if `text` is (a chunk of) a combined document: it carries at least
/// one `## File: ` heading. Chunks always repeat the heading of their section.
pub fn is_numbered_document(text: &str) -> bool {
    text.lines().any(|l| l.starts_with(FILE_HEADING_PREFIX))
}

/// Body of an added line, or `None` for anything else (including `+++`
/// headers). `numbered` lines carry the `   7 | ` display prefix.
pub fn added_line_body(line: &str, numbered: bool) -> Option<&str> {
    if line.starts_with(FILE_HEADING_PREFIX) {
        return None;
    }
    let line = if numbered {
        strip_display_prefix(line)
    } else {
        line
    };
    if line.starts_with("+++") {
        return None;
    }
    line.strip_prefix('+')
}

/// Distinct names called on added lines of a raw or combined diff.
pub fn called_symbols(diff_text: &str) -> BTreeSet<String> {
    let numbered = is_numbered_document(diff_text);
    let mut out = BTreeSet::new();
    for body in diff_text
        .lines()
        .filter_map(|l| added_line_body(l, numbered))
    {
        for caps in CALL_SITE.captures_iter(body) {
            let name = &caps[1];
            if !NOT_CALLS.contains(&name) {
                out.insert(name.to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn only_added_lines_count() {
        assert_eq!(called_symbols("+    call_function();\n"), set(&["call_function"]));
        assert_eq!(
            called_symbols("+    first_call()\n-    old_call()\n+    second_call()"),
            set(&["first_call", "second_call"])
        );
        assert_eq!(called_symbols("+    let x = 5;\n-    let y = 10;"), set(&[]));
        assert_eq!(called_symbols(""), set(&[]));
    }

    #[test]
    fn nested_calls_are_found() {
        assert_eq!(
            called_symbols("+    first_call(second_call())"),
            set(&["first_call", "second_call"])
        );
    }

    #[test]
    fn works_on_combined_documents() {
        let doc = "## File: a.rs\n   1 | @@ -1 +1,2 @@\n   2 | +helper(1);\n   3 | -gone(2);\n  10 |  ctx(3);\n";
        assert_eq!(called_symbols(doc), set(&["helper"]));
    }

    #[test]
    fn raw_context_that_looks_numbered_is_not_added() {
        let raw = "@@ -1,2 +1,2 @@\n 3 | +x(y)\n+real_call()\n";
        assert!(!is_numbered_document(raw));
        assert_eq!(called_symbols(raw), set(&["real_call"]));
    }

    #[test]
    fn control_flow_and_file_headers_are_ignored() {
        let diff = "+++ b/run(x).rs\n+    if(ready) { go(1) }\n+    while(x) {}\n";
        assert_eq!(called_symbols(diff), set(&["go"]));
    }
}
