//! Incremental stream bookkeeping
//!
//! Watermarks bound the next fetch of each stream; the merger folds each
//! returned page into a newest-per-driver view without ever regressing.

mod merger;
mod watermark;

pub use merger::{LatestByKey, MergeOutcome, Timestamped};
pub use watermark::{Stream, WatermarkCursor};
