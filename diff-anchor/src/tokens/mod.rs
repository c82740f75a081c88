//! Token budgeting: token counts and line-aligned chunking.
//!
//! Counting is profile based. `cl100k_base` is the real BPE vocabulary of the
//! completion models and is the default; the other profiles are cheap
//! estimators kept for offline budgeting. One profile always gives the same
//! count for the same text, so budgets are reproducible.

pub mod chunk;

use std::fmt;
use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;
use tracing::warn;

pub use chunk::{TokenChunk, chunk, chunk_sections};

/// Shared `cl100k_base` encoder, built on first use. `None` if the embedded
/// vocabulary could not be loaded.
fn cl100k() -> Option<&'static CoreBPE> {
    static BPE: OnceLock<Option<CoreBPE>> = OnceLock::new();
    BPE.get_or_init(|| match tiktoken_rs::cl100k_base() {
        Ok(bpe) => Some(bpe),
        Err(err) => {
            warn!("tokens: cl100k_base unavailable: {}", err);
            None
        }
    })
    .as_ref()
}

/// Supported tokenizer profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenizerProfile {
    /// BPE `cl100k_base` encoding.
    #[default]
    Cl100k,
    /// Estimate: whitespace-separated words plus half the ASCII punctuation.
    Words,
    /// One token per 4 characters, rounded up.
    Chars,
    /// One token per 4 UTF-8 bytes, rounded up.
    Bytes,
}

impl TokenizerProfile {
    /// Resolve a profile by name (case-insensitive); `None` if unknown.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "cl100k_base" | "cl100k" | "default" => Some(Self::Cl100k),
            "words" => Some(Self::Words),
            "chars" | "characters" => Some(Self::Chars),
            "bytes" => Some(Self::Bytes),
            _ => None,
        }
    }

    fn count(self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        match self {
            Self::Cl100k => match cl100k() {
                Some(bpe) => bpe.encode_with_special_tokens(text).len(),
                None => Self::Words.count(text),
            },
            Self::Words => {
                let words = text.split_whitespace().count();
                let punct = text.chars().filter(|c| c.is_ascii_punctuation()).count();
                words + punct / 2
            }
            Self::Chars => text.chars().count().div_ceil(4),
            Self::Bytes => text.len().div_ceil(4),
        }
    }
}

impl fmt::Display for TokenizerProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cl100k => "cl100k_base",
            Self::Words => "words",
            Self::Chars => "chars",
            Self::Bytes => "bytes",
        };
        f.write_str(s)
    }
}

/// Token counter bound to one profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter {
    profile: TokenizerProfile,
    fell_back: bool,
}

impl TokenCounter {
    pub fn new(profile: TokenizerProfile) -> Self {
        Self {
            profile,
            fell_back: false,
        }
    }

    /// Resolve a configured profile name. Unknown names fall back to the
    /// default profile, and an unloadable BPE vocabulary falls back to the
    /// `words` estimate; both warn instead of failing.
    pub fn from_profile_name(name: &str) -> Self {
        let (profile, mut fell_back) = match TokenizerProfile::from_name(name) {
            Some(profile) => (profile, false),
            None => {
                let profile = TokenizerProfile::default();
                warn!(
                    "tokens: unknown tokenizer profile {:?}, falling back to {}",
                    name, profile
                );
                (profile, true)
            }
        };
        let profile = if profile == TokenizerProfile::Cl100k && cl100k().is_none() {
            warn!("tokens: falling back to {}", TokenizerProfile::Words);
            fell_back = true;
            TokenizerProfile::Words
        } else {
            profile
        };
        Self { profile, fell_back }
    }

    pub fn profile(&self) -> TokenizerProfile {
        self.profile
    }

    /// True if the configured profile was not recognized.
    pub fn fell_back(&self) -> bool {
        self.fell_back
    }

    pub fn count(&self, text: &str) -> usize {
        self.profile.count(text)
    }

    /// `true` if `text` fits within `max_tokens`.
    pub fn fits(&self, text: &str, max_tokens: usize) -> bool {
        self.count(text) <= max_tokens
    }
}
