//! Tokenized chapter model
//!
//! The shape returned by the chapter source: an ordered list of text and
//! image segments, with the chapter's highlights attached.

mod types;

pub use types::{
    join_tokens, text_in_range, token_at, tokens_in_range, Chapter, ChapterHighlightData, RubyPart,
    Segment, Token,
};
