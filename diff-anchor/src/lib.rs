//! Public entry for the diff-anchor pipeline.
//!
//! Turns per-file unified diffs into model-ready review requests and turns the
//! model's line references back into diff positions.
//!
//! 1) **Step 1: Combine**
//!    - Parse each file's diff into hunks
//!    - Render one numbered document (`## File: <path>` + `   N | <line>`)
//!    - Build the `(path, display line) → position` map
//!
//! 2) **Step 2: Chunk**
//!    - Split the document at line boundaries under `max_chunk_tokens`
//!    - Repeat `## File: <path>` at the top of a chunk that starts mid-file
//!
//! 3) **Step 3: Context**
//!    - Look up definitions of names called on added lines (bounded parallel,
//!      one shared per-run cache)
//!    - Attach the developer manual and example files within their budget
//!
//! 4) **Anchoring** (after the model answered)
//!    - Parse the reply, map display lines to positions, drop what cannot be
//!      anchored, hand the rest to a `CommentSink`

pub mod config;
pub mod context;
pub mod errors;
pub mod feedback;
pub mod map;
pub mod parser;
pub mod publish;
pub mod tokens;
pub mod types;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use config::ReviewConfig;
use context::{
    AuxiliaryContext, ContextAssembler, DefinitionCache, DefinitionSource, ReferenceDocs,
    RenderedReferences, SourceTree,
};
use errors::AnchorResult;
use map::CombinedDiff;
use tokens::{TokenChunk, TokenCounter};

/// One request to the model: a diff chunk plus its auxiliary context.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewRequest {
    /// 1-based chunk index.
    pub chunk_index: usize,
    pub chunk_total: usize,
    /// Numbered diff text of this chunk.
    pub diff: String,
    pub diff_tokens: usize,
    pub definitions: AuxiliaryContext,
    pub references: RenderedReferences,
}

impl ReviewRequest {
    /// Render the request body. Empty context sections are left out; the diff
    /// section is always last.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.definitions.text.is_empty() {
            out.push_str("## Function Definitions\n");
            out.push_str(&self.definitions.text);
            out.push('\n');
        }
        if !self.references.manual.is_empty() {
            out.push_str("## Developer Manual\n");
            out.push_str(&self.references.manual);
            out.push_str("\n\n");
        }
        if !self.references.examples.is_empty() {
            out.push_str("## Examples\n");
            out.push_str(&self.references.examples);
            out.push('\n');
        }
        out.push_str(&format!(
            "## Diff (part {}/{})\n",
            self.chunk_index, self.chunk_total
        ));
        out.push_str(&self.diff);
        out
    }
}

/// Output of steps 1–3: the combined document (kept for anchoring the
/// replies) and one request per chunk.
#[derive(Debug, Clone)]
pub struct ReviewPlan {
    pub combined: CombinedDiff,
    pub requests: Vec<ReviewRequest>,
}

/// Run steps **1–3** for a set of per-file diffs (caller order preserved).
///
/// `source_root` is the checked-out repository; without it no definitions or
/// reference documents are attached.
///
/// # Logging
/// - `step1: combined files=N addressable=M`
/// - `step2: chunks=K`
/// - `step3: definitions included=I skipped=S`
pub async fn prepare_review<I, P, D>(
    files: I,
    source_root: Option<&Path>,
    cfg: &ReviewConfig,
) -> AnchorResult<ReviewPlan>
where
    I: IntoIterator<Item = (P, D)>,
    P: AsRef<str>,
    D: AsRef<str>,
{
    cfg.validate()?;

    // ---------------------------
    // Step 1: combine
    // ---------------------------
    let t1 = Instant::now();
    let combined = map::combine(files);
    debug!(
        "step1: combined files={} addressable={} ({} ms)",
        combined.sections.len(),
        combined.positions.len(),
        t1.elapsed().as_millis()
    );

    // ---------------------------
    // Step 2: chunk
    // ---------------------------
    let counter = TokenCounter::from_profile_name(&cfg.tokenizer_profile);
    let chunks = tokens::chunk_sections(&counter, &combined.text, cfg.max_chunk_tokens, |l| {
        l.starts_with(map::FILE_HEADING_PREFIX)
    });
    debug!(
        "step2: chunks={} profile={} limit={}",
        chunks.len(),
        counter.profile(),
        cfg.max_chunk_tokens
    );

    // ---------------------------
    // Step 3: context
    // ---------------------------
    let t3 = Instant::now();
    let (definitions, references) = match source_root {
        Some(root) => {
            let tree = Arc::new(SourceTree::open(root)?);
            let extensions = if cfg.file_extensions.is_empty() {
                extensions_of(combined.sections.iter().map(|s| s.path.as_str()))
            } else {
                cfg.file_extensions.clone()
            };
            let assembler = ContextAssembler::new(
                tree,
                Arc::new(DefinitionCache::new()),
                counter,
                extensions,
                cfg.max_definition_tokens,
            );
            let defs =
                assemble_chunks_concurrently(&assembler, &chunks, cfg.assemble_concurrency).await?;
            let refs = ReferenceDocs::load(root, &cfg.manual_file, &cfg.examples_dir)
                .render_within(&counter, cfg.max_reference_tokens);
            (defs, refs)
        }
        None => {
            debug!("step3: no source root, context skipped");
            (
                vec![AuxiliaryContext::default(); chunks.len()],
                RenderedReferences::default(),
            )
        }
    };
    debug!(
        "step3: definitions included={} skipped={} reference_tokens={} ({} ms)",
        definitions.iter().map(|d| d.included.len()).sum::<usize>(),
        definitions.iter().map(|d| d.skipped.len()).sum::<usize>(),
        references.tokens,
        t3.elapsed().as_millis()
    );

    let requests: Vec<ReviewRequest> = chunks
        .into_iter()
        .zip(definitions)
        .map(|(c, defs)| ReviewRequest {
            chunk_index: c.index,
            chunk_total: c.total,
            diff: c.text,
            diff_tokens: c.tokens,
            definitions: defs,
            references: references.clone(),
        })
        .collect();

    info!(
        "prepare: files={} requests={} in {} ms",
        combined.sections.len(),
        requests.len(),
        t1.elapsed().as_millis()
    );
    Ok(ReviewPlan { combined, requests })
}

/// Definition context for every chunk, assembled in parallel (bounded by
/// `concurrency`) over one shared cache. Output order matches `chunks`.
pub async fn assemble_chunks_concurrently<S>(
    assembler: &ContextAssembler<S>,
    chunks: &[TokenChunk],
    concurrency: usize,
) -> AnchorResult<Vec<AuxiliaryContext>>
where
    S: DefinitionSource + 'static,
{
    let texts = chunks.iter().map(|c| c.text.clone()).collect();
    assembler.assemble_many(texts, concurrency).await
}

/// Distinct dotted extensions of `paths`, in first-seen order.
fn extensions_of<'a>(paths: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for p in paths {
        if let Some(ext) = Path::new(p).extension() {
            let dotted = format!(".{}", ext.to_string_lossy());
            if !out.contains(&dotted) {
                out.push(dotted);
            }
        }
    }
    out
}

// -----------------------------------------------------------------------------
// Convenience re-exports for downstream users
// -----------------------------------------------------------------------------

pub use errors::Error;
pub use feedback::{ReviewComment, parse_model_reply};
pub use map::{combine, resolve};
pub use parser::parse_file_diff;
pub use publish::{AnchorReport, CommentSink, DryRunSink, anchor_comments, publish};
pub use types::{DiffLine, FileDiff, Hunk, LineKind};
