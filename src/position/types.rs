use serde::{Deserialize, Serialize};

/// Where the reader is in a book.
///
/// Field names on the wire follow the backend's progress record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReadingPosition {
    #[serde(rename = "current_chapter_index")]
    pub chapter_index: usize,
    /// Segment nearest the top of the viewport
    #[serde(rename = "current_segment_index")]
    pub segment_index: usize,
    /// Fractional scroll offset within the chapter, in [0, 1]
    pub progress_percentage: f64,
}

impl ReadingPosition {
    /// Create a position, clamping `fraction` into [0, 1]. NaN becomes 0.
    pub fn new(chapter_index: usize, segment_index: usize, fraction: f64) -> Self {
        Self {
            chapter_index,
            segment_index,
            progress_percentage: clamp_fraction(fraction),
        }
    }
}

pub(crate) fn clamp_fraction(fraction: f64) -> f64 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}
