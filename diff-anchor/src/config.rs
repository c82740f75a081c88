//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;

use crate::errors::{AnchorResult, ConfigError};

/// Knobs for one review run. All fields have defaults via `from_env`.
#[derive(Clone, Debug)]
pub struct ReviewConfig {
    /// Token ceiling for one diff chunk sent to the model.
    pub max_chunk_tokens: usize,
    /// Hard cap for a single function definition attached as context.
    pub max_definition_tokens: usize,
    /// Shared budget for the developer manual and example files.
    pub max_reference_tokens: usize,
    /// Tokenizer profile name (`cl100k_base`, `words`, `chars`, `bytes`).
    pub tokenizer_profile: String,
    /// Extensions searched for definitions (e.g. `.rs`). Empty means derive from diff paths.
    pub file_extensions: Vec<String>,
    /// Upper bound of chunks assembled in parallel.
    pub assemble_concurrency: usize,
    /// Developer manual, relative to the repository root.
    pub manual_file: PathBuf,
    /// Directory with example files, relative to the repository root.
    pub examples_dir: PathBuf,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_chunk_tokens: 6000,
            max_definition_tokens: 2000,
            max_reference_tokens: 4000,
            tokenizer_profile: "cl100k_base".to_string(),
            file_extensions: Vec::new(),
            assemble_concurrency: 4,
            manual_file: PathBuf::from("developer_manual.md"),
            examples_dir: PathBuf::from("examples"),
        }
    }
}

impl ReviewConfig {
    /// Build from environment variables, falling back to defaults for
    /// anything missing or unparsable.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_chunk_tokens: parse("MAX_TOKEN_COUNT", d.max_chunk_tokens),
            max_definition_tokens: parse("FUNCTION_DEF_TOKEN_LIMIT", d.max_definition_tokens),
            max_reference_tokens: parse("REFERENCE_TOKEN_LIMIT", d.max_reference_tokens),
            tokenizer_profile: env("TOKENIZER_PROFILE", &d.tokenizer_profile),
            file_extensions: split_extensions(&env("REVIEW_FILE_TYPES", "")),
            assemble_concurrency: parse("ASSEMBLE_CONCURRENCY", d.assemble_concurrency),
            manual_file: PathBuf::from(env("DEVELOPER_MANUAL", "developer_manual.md")),
            examples_dir: PathBuf::from(env("REVIEW_EXAMPLES_DIR", "examples")),
        }
    }

    /// Validate config sanity (no degenerate values).
    pub fn validate(&self) -> AnchorResult<()> {
        if self.max_chunk_tokens == 0 {
            return Err(ConfigError::ZeroLimit("max_chunk_tokens").into());
        }
        if self.max_definition_tokens == 0 {
            return Err(ConfigError::ZeroLimit("max_definition_tokens").into());
        }
        if self.assemble_concurrency == 0 {
            return Err(ConfigError::ZeroLimit("assemble_concurrency").into());
        }
        Ok(())
    }
}

/// Split `".rs, py ,.ts"` into normalized dotted extensions.
pub fn split_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.starts_with('.') {
                s.to_string()
            } else {
                format!(".{s}")
            }
        })
        .collect()
}

fn env(k: &str, dflt: &str) -> String {
    std::env::var(k).unwrap_or_else(|_| dflt.to_string())
}

fn parse<T: std::str::FromStr>(k: &str, dflt: T) -> T {
    std::env::var(k)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(dflt)
}
