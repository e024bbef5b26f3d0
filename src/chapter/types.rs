//! Tokenized chapter types
//!
//! Serde names follow the backend's compact chapter payload: tokens use
//! single-letter keys (`s`, `r`, `b`, `p`) and segments are tagged by `type`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::address::{AddressRange, TokenAddress};
use crate::highlights::{HighlightId, HighlightRange, StyleCategory};

/// Ruby (furigana) annotation part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubyPart {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruby: Option<String>,
}

/// One lexical token
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Token {
    /// Surface form as it appears in the text
    #[serde(rename = "s")]
    pub surface: String,
    /// Reading
    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<String>,
    /// Dictionary (base) form
    #[serde(rename = "b", default, skip_serializing_if = "Option::is_none")]
    pub base_form: Option<String>,
    /// Part of speech
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
    /// Token was preceded by whitespace in the source text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap: Option<bool>,
    #[serde(rename = "RUBY", default, skip_serializing_if = "Option::is_none")]
    pub ruby: Option<Vec<RubyPart>>,
}

/// A paragraph- or image-level unit of a chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Segment {
    Text {
        /// Raw text, only present before tokenization
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tokens: Option<Vec<Token>>,
    },
    Image {
        src: String,
        #[serde(default)]
        alt: String,
    },
}

/// Highlight as embedded in a chapter payload (no text snapshot)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterHighlightData {
    pub id: HighlightId,
    pub start_segment_index: usize,
    pub start_token_idx: usize,
    pub end_segment_index: usize,
    pub end_token_idx: usize,
    pub style_category: StyleCategory,
}

/// A chapter's content plus the highlights created in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub index: usize,
    pub title: String,
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub highlights: Vec<ChapterHighlightData>,
}

impl Token {
    /// Create a token with only a surface form
    pub fn new(surface: impl Into<String>) -> Self {
        Self {
            surface: surface.into(),
            ..Default::default()
        }
    }

    /// Create a token marked as preceded by a gap
    pub fn gapped(surface: impl Into<String>) -> Self {
        Self {
            surface: surface.into(),
            gap: Some(true),
            ..Default::default()
        }
    }

    pub fn has_gap_before(&self) -> bool {
        self.gap.unwrap_or(false)
    }
}

impl Segment {
    /// Text segment from a token list
    pub fn text(tokens: Vec<Token>) -> Self {
        Segment::Text {
            text: None,
            tokens: Some(tokens),
        }
    }

    pub fn image(src: impl Into<String>) -> Self {
        Segment::Image {
            src: src.into(),
            alt: String::new(),
        }
    }

    /// Tokens of a text segment; empty for images and untokenized text
    pub fn tokens(&self) -> &[Token] {
        match self {
            Segment::Text {
                tokens: Some(tokens),
                ..
            } => tokens,
            _ => &[],
        }
    }

    pub fn token_count(&self) -> usize {
        self.tokens().len()
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Segment::Image { .. })
    }

    /// Flatten the segment to plain text.
    ///
    /// Gapped tokens get a single leading space except the first one.
    /// Untokenized text segments fall back to their raw text.
    pub fn plain_text(&self) -> String {
        match self {
            Segment::Text {
                tokens: Some(tokens),
                ..
            } => join_tokens(tokens.iter()),
            Segment::Text {
                text: Some(text), ..
            } => text.clone(),
            _ => String::new(),
        }
    }
}

/// Concatenate surfaces with the gap rule: a space before every gapped token
/// except the first one yielded.
pub fn join_tokens<'a>(tokens: impl Iterator<Item = &'a Token>) -> String {
    let mut out = String::new();
    for (i, token) in tokens.enumerate() {
        if i > 0 && token.has_gap_before() {
            out.push(' ');
        }
        out.push_str(&token.surface);
    }
    out
}

impl Chapter {
    /// Token count of every segment, keyed by segment index.
    ///
    /// Image segments are recorded with a count of zero so nothing inside
    /// them is ever marked.
    pub fn segment_token_counts(&self) -> HashMap<usize, usize> {
        self.segments
            .iter()
            .enumerate()
            .map(|(i, segment)| (i, segment.token_count()))
            .collect()
    }

    /// Bounds-checked token lookup
    pub fn token(&self, address: TokenAddress) -> Option<&Token> {
        token_at(&self.segments, address)
    }

    /// Surface text covered by `range`, skipping addresses that do not exist
    pub fn text_in_range(&self, range: &AddressRange) -> String {
        text_in_range(&self.segments, range)
    }

    /// Convert the embedded highlight list to confirmed ranges, rebuilding
    /// each one's text snapshot from the tokens.
    pub fn confirmed_highlights(&self) -> Vec<HighlightRange> {
        self.highlights
            .iter()
            .map(|data| {
                let range = data.range();
                HighlightRange {
                    id: data.id,
                    chapter_index: self.index,
                    range,
                    style: data.style_category.clone(),
                    source_text: self.text_in_range(&range),
                }
            })
            .collect()
    }
}

impl ChapterHighlightData {
    pub fn range(&self) -> AddressRange {
        AddressRange::new(
            TokenAddress::new(self.start_segment_index, self.start_token_idx),
            TokenAddress::new(self.end_segment_index, self.end_token_idx),
        )
    }
}

/// Bounds-checked token lookup over a raw segment list
pub fn token_at(segments: &[Segment], address: TokenAddress) -> Option<&Token> {
    segments
        .get(address.segment_index)?
        .tokens()
        .get(address.token_index)
}

/// Iterate the tokens covered by `range`, silently skipping addresses
/// outside the segment list.
pub fn tokens_in_range<'a>(
    segments: &'a [Segment],
    range: &AddressRange,
) -> impl Iterator<Item = &'a Token> + 'a {
    let range = *range;
    range
        .segments()
        .filter_map(move |segment_index| segments.get(segment_index).map(|s| (segment_index, s)))
        .flat_map(move |(segment_index, segment)| {
            let tokens = segment.tokens();
            let first = if segment_index == range.start.segment_index {
                range.start.token_index
            } else {
                0
            };
            let last = if segment_index == range.end.segment_index {
                range.end.token_index.saturating_add(1).min(tokens.len())
            } else {
                tokens.len()
            };
            tokens.get(first..last).unwrap_or(&[]).iter()
        })
}

/// Surface text covered by `range` over a raw segment list
pub fn text_in_range(segments: &[Segment], range: &AddressRange) -> String {
    join_tokens(tokens_in_range(segments, range))
}
