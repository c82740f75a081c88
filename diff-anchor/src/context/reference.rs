//! Developer manual and example files attached as read-only reference.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::tokens::TokenCounter;

/// Reference documents found in a repository.
#[derive(Debug, Clone, Default)]
pub struct ReferenceDocs {
    pub manual: Option<String>,
    /// `(file name, content)` sorted by path.
    pub examples: Vec<(String, String)>,
}

/// Reference text that fit the budget, plus what was left out.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderedReferences {
    pub manual: String,
    pub examples: String,
    pub tokens: usize,
    pub omitted: Vec<String>,
}

impl ReferenceDocs {
    /// Load `manual_file` and every readable file under `examples_dir`
    /// (both relative to `root`). Missing pieces are simply absent.
    pub fn load(root: &Path, manual_file: &Path, examples_dir: &Path) -> Self {
        let manual_path = root.join(manual_file);
        let manual = match fs::read_to_string(&manual_path) {
            Ok(text) => Some(text),
            Err(_) => {
                debug!("reference: no manual at {}", manual_path.display());
                None
            }
        };

        let examples_root = root.join(examples_dir);
        let mut examples = Vec::new();
        if examples_root.is_dir() {
            let mut paths: Vec<_> = WalkDir::new(&examples_root)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .collect();
            paths.sort();
            for p in paths {
                match fs::read_to_string(&p) {
                    Ok(text) => {
                        let name = p
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        examples.push((name, text));
                    }
                    Err(err) => warn!("reference: skip {}: {}", p.display(), err),
                }
            }
        } else {
            debug!("reference: no examples dir at {}", examples_root.display());
        }

        Self { manual, examples }
    }

    /// Fit manual then examples (in order) into `max_tokens`. A part that does
    /// not fit the remaining budget is omitted whole, never truncated.
    pub fn render_within(&self, counter: &TokenCounter, max_tokens: usize) -> RenderedReferences {
        let mut out = RenderedReferences::default();
        let mut remaining = max_tokens;

        if let Some(manual) = &self.manual {
            let t = counter.count(manual);
            if t <= remaining {
                out.manual = manual.clone();
                remaining -= t;
                out.tokens += t;
            } else {
                warn!("reference: manual omitted ({} tokens > {} left)", t, remaining);
                out.omitted.push("developer manual".to_string());
            }
        }

        for (name, text) in &self.examples {
            let section = format!("### Example File: {name}\n{text}\n");
            let t = counter.count(&section);
            if t <= remaining {
                out.examples.push_str(&section);
                remaining -= t;
                out.tokens += t;
            } else {
                warn!("reference: example {} omitted ({} tokens > {} left)", name, t, remaining);
                out.omitted.push(name.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::TokenizerProfile;

    #[test]
    fn loads_manual_and_sorted_examples() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("developer_manual.md"), "Use Result.").unwrap();
        fs::create_dir_all(dir.path().join("examples/nested")).unwrap();
        fs::write(dir.path().join("examples/b.rs"), "fn b() {}").unwrap();
        fs::write(dir.path().join("examples/nested/a.rs"), "fn a() {}").unwrap();

        let docs = ReferenceDocs::load(
            dir.path(),
            Path::new("developer_manual.md"),
            Path::new("examples"),
        );
        assert_eq!(docs.manual.as_deref(), Some("Use Result."));
        let names: Vec<&str> = docs.examples.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b.rs", "a.rs"]);
    }

    #[test]
    fn missing_docs_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let docs = ReferenceDocs::load(dir.path(), Path::new("m.md"), Path::new("ex"));
        assert!(docs.manual.is_none());
        assert!(docs.examples.is_empty());
    }

    #[test]
    fn parts_over_budget_are_omitted_whole() {
        let docs = ReferenceDocs {
            manual: Some("one two three".into()),
            examples: vec![
                ("big.rs".into(), "a b c d e f g h i j".into()),
                ("small.rs".into(), "x".into()),
            ],
        };
        let counter = TokenCounter::new(TokenizerProfile::Words);
        let r = docs.render_within(&counter, 10);
        assert_eq!(r.manual, "one two three");
        assert!(r.examples.contains("small.rs"));
        assert!(!r.examples.contains("big.rs"));
        assert_eq!(r.omitted, vec!["big.rs".to_string()]);
        assert!(r.tokens <= 10);
    }
}
