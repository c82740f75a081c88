//! Position resolver: new-file line number → diff position.
//!
//! Convention: position is the 1-based ordinal of a body line within one
//! file's diff. Hunk header lines never take a slot and the counter is not
//! reset between hunks, so position keeps growing until the next file.

use tracing::debug;

use crate::types::FileDiff;

/// Compute the position used to anchor a comment at `target_new_line`.
///
/// Returns `None` when the line is not part of any emitted diff line
/// (unchanged code outside the hunks, or a line that only exists as Removed).
pub fn resolve(file: &FileDiff, target_new_line: u32) -> Option<u32> {
    let mut position = 0u32;
    for line in file.lines() {
        position += 1;
        if line.is_addressable() && line.new_line == Some(target_new_line) {
            return Some(position);
        }
    }
    debug!(
        "resolve: line {} not found in {} (body_lines={})",
        target_new_line, file.path, position
    );
    None
}
