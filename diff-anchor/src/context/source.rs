//! Source tree scanning for function definitions.
//!
//! `SourceTree` walks a checked-out repository and returns the first
//! definition of a name it can find. Python blocks end at the first dedent;
//! brace languages are balanced on `{`/`}` and fall back to the next blank line.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::errors::{AnchorResult, SourceError};

/// Function definition found in the source tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Definition {
    pub name: String,
    /// Repo-relative path of the originating file.
    pub file: String,
    pub text: String,
}

/// Anything that can look up a definition by extension and name.
///
/// Implementations must be deterministic for the lifetime of one review run;
/// results are cached under `(root_key, extension, name)`.
pub trait DefinitionSource: Send + Sync {
    /// Identity of the tree, used to scope cache entries.
    fn root_key(&self) -> String;

    fn find_definition(&self, extension: &str, name: &str) -> Option<Definition>;
}

/// Checked-out repository on disk.
#[derive(Debug, Clone)]
pub struct SourceTree {
    root: PathBuf,
}

impl SourceTree {
    pub fn open(root: impl Into<PathBuf>) -> AnchorResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SourceError::MissingRoot(root.display().to_string()).into());
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DefinitionSource for SourceTree {
    fn root_key(&self) -> String {
        self.root().display().to_string()
    }

    fn find_definition(&self, extension: &str, name: &str) -> Option<Definition> {
        let mut entries: Vec<DirEntry> = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(keep_entry)
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_string_lossy().ends_with(extension))
            .collect();
        entries.sort_by(|a, b| a.path().cmp(b.path()));

        for entry in entries {
            let path = entry.path();
            let content = match fs::read_to_string(path) {
                Ok(c) => c,
                Err(err) => {
                    warn!("source: skip unreadable {}: {}", path.display(), err);
                    continue;
                }
            };
            if let Some(text) = extract_definition(&content, extension, name) {
                let rel = path.strip_prefix(self.root()).unwrap_or(path);
                let file = rel.to_string_lossy().replace('\\', "/");
                debug!("source: found {} in {}", name, file);
                return Some(Definition {
                    name: name.to_string(),
                    file,
                    text,
                });
            }
        }
        None
    }
}

/// Skip hidden directories and common build/dependency folders.
fn keep_entry(e: &DirEntry) -> bool {
    if e.depth() == 0 || !e.file_type().is_dir() {
        return true;
    }
    let name = e.file_name().to_string_lossy();
    !(name.starts_with('.') || name == "target" || name == "node_modules" || name == "__pycache__")
}

/// Extract the definition of `name` from one file's text.
pub fn extract_definition(content: &str, extension: &str, name: &str) -> Option<String> {
    if extension == ".py" {
        extract_python(content, name)
    } else {
        extract_braced(content, name)
    }
}

fn extract_python(content: &str, name: &str) -> Option<String> {
    let pattern = format!(r"^([ \t]*)(?:async[ \t]+)?def[ \t]+{}[ \t]*\(", regex::escape(name));
    let re = Regex::new(&pattern).ok()?;

    let lines: Vec<&str> = content.lines().collect();
    let (start, indent) = lines.iter().enumerate().find_map(|(i, l)| {
        re.captures(l)
            .map(|c| (i, c.get(1).map_or(0, |m| m.as_str().len())))
    })?;

    let mut end = signature_end(&lines, start) + 1;
    while end < lines.len() {
        let l = lines[end];
        if !l.trim().is_empty() && leading_ws(l) <= indent {
            break;
        }
        end += 1;
    }
    while end > start + 1 && lines[end - 1].trim().is_empty() {
        end -= 1;
    }
    Some(lines[start..end].join("\n"))
}

/// Index of the line closing the `def` signature that opens at `start`:
/// the first line where `(`/`[`/`{` nesting is back to zero.
fn signature_end(lines: &[&str], start: usize) -> usize {
    let mut depth = 0i32;
    for (i, line) in lines.iter().enumerate().skip(start) {
        for ch in line.chars() {
            match ch {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                '#' => break,
                _ => {}
            }
        }
        if depth <= 0 {
            return i;
        }
    }
    start
}

fn leading_ws(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn extract_braced(content: &str, name: &str) -> Option<String> {
    let pattern = format!(
        r"(?m)^[ \t]*(?:(?:pub(?:\([^)]*\))?|export|async|static|public|private|protected|unsafe|const|extern)[ \t]+)*(?:fn|function|func|def)[ \t]+{}[ \t]*[<(]",
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    let start = re.find(content)?.start();
    let rest = &content[start..];

    if let Some(len) = balanced_len(rest) {
        return Some(rest[..len].to_string());
    }
    let end = rest.find("\n\n").unwrap_or(rest.len());
    Some(rest[..end].trim_end().to_string())
}

/// Length of `s` up to and including the `}` closing the first `{`.
/// `None` if a blank line comes before the first `{` or braces never balance.
fn balanced_len(s: &str) -> Option<usize> {
    let open = s.find('{')?;
    if s[..open].contains("\n\n") {
        return None;
    }
    let mut depth = 0usize;
    for (i, ch) in s[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_function_is_brace_balanced() {
        let src = "use x;\n\npub fn helper(a: u32) -> u32 {\n    if a > 1 {\n        a\n    } else { 0 }\n}\n\nfn other() {}\n";
        let def = extract_definition(src, ".rs", "helper").unwrap();
        assert!(def.starts_with("pub fn helper("));
        assert!(def.ends_with("else { 0 }\n}"));
        assert!(!def.contains("other"));
    }

    #[test]
    fn javascript_function_is_found() {
        let src = "export function render(x) {\n  return x;\n}\n";
        let def = extract_definition(src, ".js", "render").unwrap();
        assert_eq!(def, "export function render(x) {\n  return x;\n}");
    }

    #[test]
    fn python_block_ends_at_dedent() {
        let src = "import os\n\nasync def fetch(url):\n    a = 1\n\n    return a\n\ndef next_one():\n    pass\n";
        let def = extract_definition(src, ".py", "fetch").unwrap();
        assert_eq!(def, "async def fetch(url):\n    a = 1\n\n    return a");
    }

    #[test]
    fn python_multiline_signature_keeps_the_body() {
        let src = "def helper(\n    a,\n    b,\n):\n    return a + b\n\nx = helper(1, 2)\n";
        let def = extract_definition(src, ".py", "helper").unwrap();
        assert_eq!(def, "def helper(\n    a,\n    b,\n):\n    return a + b");

        let src = "class C:\n    def run(self,\n            items: list[int]) -> dict[str, int]:\n        return {}\n    def other(self):\n        pass\n";
        let def = extract_definition(src, ".py", "run").unwrap();
        assert!(def.ends_with("        return {}"));
        assert!(!def.contains("other"));
    }

    #[test]
    fn unbalanced_falls_back_to_blank_line() {
        let src = "fn broken() {\n    let x = 1;\n\nmore\n";
        let def = extract_definition(src, ".rs", "broken").unwrap();
        assert_eq!(def, "fn broken() {\n    let x = 1;");
    }

    #[test]
    fn name_must_match_exactly() {
        let src = "fn helper_two() {}\n";
        assert!(extract_definition(src, ".rs", "helper").is_none());
        assert!(extract_definition(src, ".rs", "helper_two").is_some());
    }

    #[test]
    fn tree_scan_skips_hidden_and_target_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("target")).unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("target/gen.rs"), "fn helper() { 0 }\n").unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "fn helper() { 1 }\n").unwrap();

        let tree = SourceTree::open(dir.path()).unwrap();
        assert_eq!(tree.root(), dir.path());
        assert_eq!(tree.root_key(), dir.path().display().to_string());
        let def = tree.find_definition(".rs", "helper").unwrap();
        assert_eq!(def.file, "src/lib.rs");
        assert_eq!(def.text, "fn helper() { 1 }");
        assert!(tree.find_definition(".py", "helper").is_none());
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(SourceTree::open("/definitely/not/here").is_err());
    }
}
