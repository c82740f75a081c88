//! Addressing of diff lines: new-file line → position, display line → position.

pub mod combine;
pub mod resolve;

pub use combine::{
    Anchor, CombinedDiff, FILE_HEADING_PREFIX, FileSection, PositionMap, combine,
    render_display_line,
};
pub use resolve::resolve;
