//! Highlight types
//!
//! Confirmed highlights carry a server-assigned id; pending highlights carry
//! a locally generated temporary id until the server answers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::address::AddressRange;

/// Server-assigned highlight id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightId(pub i64);

/// Local id of a not-yet-confirmed highlight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempId(pub Uuid);

/// Visual style class of a highlight (`default`, `vocab`, `grammar`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleCategory(String);

/// A confirmed highlight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightRange {
    pub id: HighlightId,
    pub chapter_index: usize,
    pub range: AddressRange,
    pub style: StyleCategory,
    /// Text snapshot taken at creation
    pub source_text: String,
}

/// An optimistically created highlight awaiting server confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingHighlight {
    pub temp_id: TempId,
    pub chapter_index: usize,
    pub range: AddressRange,
    pub style: StyleCategory,
    pub source_text: String,
}

/// What the user selected, before any id exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightDraft {
    pub range: AddressRange,
    pub style: StyleCategory,
    pub source_text: String,
}

/// Identifies either a confirmed or a pending highlight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HighlightKey {
    Confirmed(HighlightId),
    Pending(TempId),
}

/// Anything that paints a style over an address range
pub trait StyledRange {
    fn range(&self) -> &AddressRange;
    fn style(&self) -> &StyleCategory;
}

impl StyledRange for HighlightRange {
    fn range(&self) -> &AddressRange {
        &self.range
    }

    fn style(&self) -> &StyleCategory {
        &self.style
    }
}

impl StyledRange for PendingHighlight {
    fn range(&self) -> &AddressRange {
        &self.range
    }

    fn style(&self) -> &StyleCategory {
        &self.style
    }
}

impl TempId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TempId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HighlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tmp-{}", self.0)
    }
}

impl StyleCategory {
    pub const DEFAULT: &'static str = "default";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for StyleCategory {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl From<&str> for StyleCategory {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for StyleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl HighlightDraft {
    pub fn new(range: AddressRange, style: impl Into<StyleCategory>, source_text: impl Into<String>) -> Self {
        Self {
            range,
            style: style.into(),
            source_text: source_text.into(),
        }
    }
}

impl PendingHighlight {
    /// Synthesize a pending highlight with a fresh temporary id
    pub fn from_draft(draft: HighlightDraft, chapter_index: usize) -> Self {
        Self {
            temp_id: TempId::new(),
            chapter_index,
            range: draft.range,
            style: draft.style,
            source_text: draft.source_text,
        }
    }

    /// Promote to a confirmed highlight once the server assigned an id
    pub fn confirm(self, id: HighlightId) -> HighlightRange {
        HighlightRange {
            id,
            chapter_index: self.chapter_index,
            range: self.range,
            style: self.style,
            source_text: self.source_text,
        }
    }
}
