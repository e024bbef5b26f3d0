//! Request and response types for backend collaborators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AnalysisLimits;
use crate::context::ContextWindow;
use crate::highlights::{HighlightId, PendingHighlight, StyleCategory};
use crate::position::ReadingPosition;

/// Create highlight request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateHighlightRequest {
    pub book_id: String,
    pub chapter_index: usize,
    pub start_segment_index: usize,
    pub start_token_idx: usize,
    pub end_segment_index: usize,
    pub end_token_idx: usize,
    pub style_category: StyleCategory,
    pub selected_text: String,
}

/// Highlight record returned by the backend after creation
#[derive(Debug, Clone, Deserialize)]
pub struct HighlightResponse {
    pub id: HighlightId,
    pub book_id: String,
    pub chapter_index: usize,
    pub created_at: Option<DateTime<Utc>>,
}

/// Progress record returned by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressResponse {
    pub book_id: String,
    #[serde(flatten)]
    pub position: ReadingPosition,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Payload for the analysis service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub book_id: String,
    pub chapter_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_id: Option<HighlightId>,
    pub target_text: String,
    pub context_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_preference: Option<String>,
}

/// A grammar point found in the target text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarPoint {
    pub target_text: String,
    pub pattern: String,
    /// JLPT level (N5..N1) when the service reports one
    #[serde(default)]
    pub level: Option<String>,
    pub explanation: String,
}

/// Contextual nuance of a single word
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyNuance {
    pub target_text: String,
    pub base_form: String,
    #[serde(default)]
    pub conjugation: Option<String>,
    pub nuance: String,
}

/// Structured result of the analysis service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub translation: String,
    #[serde(default)]
    pub grammar_analysis: Vec<GrammarPoint>,
    #[serde(default)]
    pub vocabulary_nuance: Vec<VocabularyNuance>,
    #[serde(default)]
    pub cultural_notes: Option<String>,
}

impl CreateHighlightRequest {
    pub fn from_pending(book_id: &str, pending: &PendingHighlight) -> Self {
        Self {
            book_id: book_id.to_string(),
            chapter_index: pending.chapter_index,
            start_segment_index: pending.range.start.segment_index,
            start_token_idx: pending.range.start.token_index,
            end_segment_index: pending.range.end.segment_index,
            end_token_idx: pending.range.end.token_index,
            style_category: pending.style.clone(),
            selected_text: pending.source_text.clone(),
        }
    }
}

impl AnalysisRequest {
    /// Build an analysis payload from an extracted context window, truncating
    /// both texts to the endpoint's limits.
    pub fn from_window(
        book_id: &str,
        chapter_index: usize,
        highlight_id: Option<HighlightId>,
        window: ContextWindow,
        limits: &AnalysisLimits,
    ) -> Self {
        let target_text = truncate_chars(window.target_text, limits.max_target_length);
        let context_text = truncate_chars(window.context_text, limits.max_context_length);

        Self {
            book_id: book_id.to_string(),
            chapter_index,
            highlight_id,
            target_text,
            context_text,
            user_prompt: None,
            model_preference: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.user_prompt = Some(prompt.into());
        self
    }
}

fn truncate_chars(text: String, max: usize) -> String {
    if text.chars().count() <= max {
        return text;
    }
    tracing::debug!("Truncating analysis text to {} chars", max);
    text.chars().take(max).collect()
}
