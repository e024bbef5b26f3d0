//! Context-window extraction
//!
//! Given a highlight, rebuilds its exact text and a sentence-aligned window
//! around it, capped at a char budget, for the analysis service.
//!
//! ```
//! use shiori_engine::address::{AddressRange, TokenAddress};
//! use shiori_engine::chapter::{Segment, Token};
//! use shiori_engine::config::ContextConfig;
//! use shiori_engine::context::extract_context;
//! use shiori_engine::highlights::{HighlightId, HighlightRange};
//!
//! let segments = vec![Segment::text(
//!     ["彼", "は", "走っ", "た", "。", "雨", "だ", "。"].into_iter().map(Token::new).collect(),
//! )];
//! let highlight = HighlightRange {
//!     id: HighlightId(1),
//!     chapter_index: 0,
//!     range: AddressRange::new(TokenAddress::new(0, 2), TokenAddress::new(0, 3)),
//!     style: "vocab".into(),
//!     source_text: "走った".to_string(),
//! };
//!
//! let window = extract_context(&highlight, &segments, &ContextConfig::default());
//! assert_eq!(window.target_text, "走った");
//! assert_eq!(window.context_text, "彼は走った。雨だ。");
//! ```

mod extractor;
pub mod sentences;

pub use extractor::{extract_context, extract_context_by_id, ContextWindow};
