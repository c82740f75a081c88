//! Function-definition context for a diff (or one chunk of it).
//!
//! For every distinct name called on an added line, look up a definition
//! (cached per run) and attach it if it fits `max_definition_tokens`.
//! Oversized definitions are never truncated: they are skipped and recorded.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::cache::DefinitionCache;
use super::source::DefinitionSource;
use super::symbols::called_symbols;
use crate::errors::AnchorResult;
use crate::tokens::TokenCounter;

/// Why a called name produced no context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    NotFound,
    OverBudget { tokens: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSymbol {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncludedDefinition {
    pub name: String,
    pub file: String,
    pub tokens: usize,
}

/// Definitions section for one request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuxiliaryContext {
    pub text: String,
    pub included: Vec<IncludedDefinition>,
    pub skipped: Vec<SkippedSymbol>,
}

/// Assembles definition context against one source tree and one cache.
pub struct ContextAssembler<S> {
    source: Arc<S>,
    cache: Arc<DefinitionCache>,
    counter: TokenCounter,
    extensions: Vec<String>,
    max_definition_tokens: usize,
}

impl<S> Clone for ContextAssembler<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            cache: self.cache.clone(),
            counter: self.counter,
            extensions: self.extensions.clone(),
            max_definition_tokens: self.max_definition_tokens,
        }
    }
}

impl<S: DefinitionSource + 'static> ContextAssembler<S> {
    pub fn new(
        source: Arc<S>,
        cache: Arc<DefinitionCache>,
        counter: TokenCounter,
        extensions: Vec<String>,
        max_definition_tokens: usize,
    ) -> Self {
        Self {
            source,
            cache,
            counter,
            extensions,
            max_definition_tokens,
        }
    }

    pub fn cache(&self) -> &DefinitionCache {
        &self.cache
    }

    /// Definitions for every name called on an added line of `diff_text`.
    pub fn assemble(&self, diff_text: &str) -> AuxiliaryContext {
        self.assemble_symbols(&called_symbols(diff_text))
    }

    /// Definitions for an explicit set of names (sorted, each at most once).
    pub fn assemble_symbols(&self, symbols: &BTreeSet<String>) -> AuxiliaryContext {
        let mut out = AuxiliaryContext::default();

        for name in symbols {
            let found = self
                .extensions
                .iter()
                .find_map(|ext| self.cache.lookup(self.source.as_ref(), ext, name));

            let Some(def) = found else {
                out.skipped.push(SkippedSymbol {
                    name: name.clone(),
                    reason: SkipReason::NotFound,
                });
                continue;
            };

            let tokens = self.counter.count(&def.text);
            if tokens > self.max_definition_tokens {
                warn!(
                    "assemble: definition {} in {} exceeds limit ({} > {}), skipped",
                    name, def.file, tokens, self.max_definition_tokens
                );
                out.skipped.push(SkippedSymbol {
                    name: name.clone(),
                    reason: SkipReason::OverBudget {
                        tokens,
                        limit: self.max_definition_tokens,
                    },
                });
                continue;
            }

            out.text.push_str(&format!(
                "--- Function Definition: {} (File: {}) ---\n{}\n\n",
                name, def.file, def.text
            ));
            out.included.push(IncludedDefinition {
                name: name.clone(),
                file: def.file,
                tokens,
            });
        }

        debug!(
            "assemble: symbols={} included={} skipped={}",
            symbols.len(),
            out.included.len(),
            out.skipped.len()
        );
        out
    }

    /// Assemble several texts in parallel (bounded by `concurrency`), sharing
    /// the cache. Output order matches input order.
    pub async fn assemble_many(
        &self,
        texts: Vec<String>,
        concurrency: usize,
    ) -> AnchorResult<Vec<AuxiliaryContext>> {
        let sem = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut handles = Vec::with_capacity(texts.len());

        for text in texts {
            let permit = sem.clone().acquire_owned().await.map_err(|e| {
                crate::errors::Error::Join(format!("semaphore closed: {e}"))
            })?;
            let this = self.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                this.assemble(&text)
            }));
        }

        let mut out = Vec::with_capacity(handles.len());
        for h in handles {
            out.push(h.await?);
        }
        info!(
            "assemble: {} parts done, cache scans={} hits={}",
            out.len(),
            self.cache.scans(),
            self.cache.hits()
        );
        Ok(out)
    }
}
