//! Output types returned by the split entry points.

use crate::request::SlideResponse;
use serde::Serialize;

/// The result of one split: the slides plus what it took to get them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideSet {
    /// Exactly the requested number of slides, in source order.
    pub slides: Vec<String>,
    pub stats: SplitStats,
}

impl SlideSet {
    /// Drop the stats and keep the boundary response.
    pub fn into_response(self) -> SlideResponse {
        SlideResponse {
            slides: self.slides,
        }
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }
}

/// Counters and timings for one split.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitStats {
    /// Registry id of the model that was called.
    pub model: String,
    /// Number of chunks sent to the model.
    pub chunks: usize,
    /// Sections requested per chunk.
    pub sections_per_chunk: usize,
    /// Sections the model returned, summed over all chunks.
    pub sections_returned: usize,
    /// Blank sections dropped before reconciliation.
    pub blank_sections_dropped: usize,
    /// Whether source text the model skipped was appended as a slide.
    pub remainder_appended: bool,
    /// Group size used when too many sections came back.
    pub merge_factor: Option<usize>,
    /// Empty slides added to reach the requested count.
    pub padded_slides: usize,
    /// Retries spent across all chunks.
    pub retries: u32,
    /// Wall-clock time of the whole split.
    pub total_duration_ms: u64,
    /// Time spent waiting on the model.
    pub llm_duration_ms: u64,
}
