//! Anchoring model comments and handing them to a comment sink.
//!
//! A comment whose display line has no position is dropped and counted; it is
//! never sent with a guessed position.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::AnchorResult;
use crate::feedback::ReviewComment;
use crate::map::CombinedDiff;

/// `(path, position, body)` triple accepted by a comment sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnchoredComment {
    pub path: String,
    pub position: u32,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DropReason {
    /// The path is not part of the combined diff.
    UnknownFile,
    /// The display line is a header, a removed line, or out of range.
    NotAddressable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedComment {
    pub comment: ReviewComment,
    pub reason: DropReason,
}

/// Outcome of anchoring, in input order.
#[derive(Debug, Clone, Default)]
pub struct AnchorReport {
    pub anchored: Vec<AnchoredComment>,
    pub dropped: Vec<DroppedComment>,
}

impl AnchorReport {
    pub fn dropped_count(&self, reason: DropReason) -> usize {
        self.dropped.iter().filter(|d| d.reason == reason).count()
    }
}

/// Translate model-referenced display lines into diff positions.
pub fn anchor_comments(
    combined: &CombinedDiff,
    comments: impl IntoIterator<Item = ReviewComment>,
) -> AnchorReport {
    let mut report = AnchorReport::default();

    for c in comments {
        if !combined.positions.contains_file(&c.path) {
            warn!("publish: no diff for {}, comment dropped", c.path);
            report.dropped.push(DroppedComment {
                comment: c,
                reason: DropReason::UnknownFile,
            });
            continue;
        }
        match combined.position_for_display(&c.path, c.display_line) {
            Some(position) => {
                debug!(
                    "publish: {} line {} → position {}",
                    c.path, c.display_line, position
                );
                report.anchored.push(AnchoredComment {
                    path: c.path,
                    position,
                    body: c.body,
                });
            }
            None => {
                warn!(
                    "publish: {} line {} is not addressable, comment dropped",
                    c.path, c.display_line
                );
                report.dropped.push(DroppedComment {
                    comment: c,
                    reason: DropReason::NotAddressable,
                });
            }
        }
    }

    info!(
        "publish: anchored={} dropped_unknown_file={} dropped_not_addressable={}",
        report.anchored.len(),
        report.dropped_count(DropReason::UnknownFile),
        report.dropped_count(DropReason::NotAddressable)
    );
    report
}

/// Destination of anchored comments (hosting API client, test double, ...).
pub trait CommentSink {
    fn post(&mut self, comment: &AnchoredComment) -> AnchorResult<()>;
}

/// Sink that only logs and keeps what it would have posted.
#[derive(Debug, Default)]
pub struct DryRunSink {
    pub posted: Vec<AnchoredComment>,
}

impl CommentSink for DryRunSink {
    fn post(&mut self, comment: &AnchoredComment) -> AnchorResult<()> {
        info!(
            "publish: [dry-run] {} position={} body_len={}",
            comment.path,
            comment.position,
            comment.body.len()
        );
        self.posted.push(comment.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishSummary {
    pub posted: usize,
    pub failed: usize,
    pub dropped: usize,
}

/// Send every anchored comment in order. Sink failures are logged and
/// counted; they do not stop the remaining comments.
pub fn publish<K: CommentSink>(sink: &mut K, report: &AnchorReport) -> PublishSummary {
    let mut summary = PublishSummary {
        dropped: report.dropped.len(),
        ..PublishSummary::default()
    };
    for c in &report.anchored {
        match sink.post(c) {
            Ok(()) => summary.posted += 1,
            Err(err) => {
                warn!("publish: sink rejected {} position={}: {}", c.path, c.position, err);
                summary.failed += 1;
            }
        }
    }
    info!(
        "publish: done posted={} failed={} dropped={}",
        summary.posted, summary.failed, summary.dropped
    );
    summary
}
