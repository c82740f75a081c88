mod telemetry;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use diff_anchor::config::ReviewConfig;
use diff_anchor::publish::{DropReason, PublishSummary};
use diff_anchor::{DryRunSink, anchor_comments, parse_model_reply, prepare_review, publish};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "review-runner",
    about = "Numbered diffs for model review and diff-position anchoring of its comments"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Combine, chunk and attach context; print one request per chunk as JSON.
    Prepare {
        /// JSON file with `[{"path": .., "diff": ..}]` in review order.
        #[arg(long)]
        diffs: PathBuf,
        /// Checked-out repository used for definitions and reference docs.
        #[arg(long)]
        source_root: Option<PathBuf>,
    },
    /// Map the line references of a model reply to diff positions.
    Anchor {
        /// Same diffs file that was given to `prepare`.
        #[arg(long)]
        diffs: PathBuf,
        /// Raw model reply (JSON, possibly wrapped in prose).
        #[arg(long)]
        reply: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
struct FileInput {
    path: String,
    diff: String,
}

#[derive(Debug, Serialize)]
struct PreparedRequest {
    chunk_index: usize,
    chunk_total: usize,
    diff_tokens: usize,
    prompt: String,
    definitions: Vec<diff_anchor::context::IncludedDefinition>,
    skipped_definitions: Vec<diff_anchor::context::SkippedSymbol>,
    omitted_references: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AnchorOutput {
    comments: Vec<diff_anchor::publish::AnchoredComment>,
    dropped_unknown_file: usize,
    dropped_not_addressable: usize,
    summary: PublishSummary,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set.
    dotenvy::dotenv().ok();
    telemetry::init("info,diff_anchor=info")?;

    let cli = Cli::parse();
    let cfg = ReviewConfig::from_env();

    match cli.command {
        Command::Prepare { diffs, source_root } => {
            let files = read_diffs(&diffs)?;
            let plan = prepare_review(
                files.iter().map(|f| (f.path.as_str(), f.diff.as_str())),
                source_root.as_deref(),
                &cfg,
            )
            .await?;

            let out: Vec<PreparedRequest> = plan
                .requests
                .iter()
                .map(|r| PreparedRequest {
                    chunk_index: r.chunk_index,
                    chunk_total: r.chunk_total,
                    diff_tokens: r.diff_tokens,
                    prompt: r.render(),
                    definitions: r.definitions.included.clone(),
                    skipped_definitions: r.definitions.skipped.clone(),
                    omitted_references: r.references.omitted.clone(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Anchor { diffs, reply } => {
            let files = read_diffs(&diffs)?;
            let combined =
                diff_anchor::combine(files.iter().map(|f| (f.path.as_str(), f.diff.as_str())));

            let raw = fs::read_to_string(&reply)
                .with_context(|| format!("read reply {}", reply.display()))?;
            let default_path = match files.as_slice() {
                [only] => Some(only.path.as_str()),
                _ => None,
            };
            let comments = parse_model_reply(&raw, default_path)?;
            let report = anchor_comments(&combined, comments);

            let mut sink = DryRunSink::default();
            let summary = publish(&mut sink, &report);

            let out = AnchorOutput {
                comments: sink.posted,
                dropped_unknown_file: report.dropped_count(DropReason::UnknownFile),
                dropped_not_addressable: report.dropped_count(DropReason::NotAddressable),
                summary,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    info!("review-runner: done");
    Ok(())
}

fn read_diffs(path: &Path) -> anyhow::Result<Vec<FileInput>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read diffs {}", path.display()))?;
    let files: Vec<FileInput> =
        serde_json::from_str(&text).with_context(|| format!("parse diffs {}", path.display()))?;
    Ok(files)
}
