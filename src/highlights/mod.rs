//! Highlights
//!
//! Types for confirmed and pending highlights, the derived per-token
//! [`HighlightIndex`], and the [`AnnotationController`] that keeps both in
//! step with the highlight service.

pub mod controller;
pub mod index;
mod types;

pub use controller::{AnnotationController, CreateHandle, CreateOutcome, DeleteHandle, DeleteOutcome};
pub use index::{build_index, find_highlight_at, HighlightIndex, UNKNOWN_SEGMENT_TOKEN_SENTINEL};
pub use types::{
    HighlightDraft, HighlightId, HighlightKey, HighlightRange, PendingHighlight, StyleCategory,
    StyledRange, TempId,
};
