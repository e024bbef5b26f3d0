use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::sentences::{sentence_at, sentence_spans};
use crate::address::{AddressRange, TokenAddress};
use crate::chapter::{join_tokens, tokens_in_range, Segment};
use crate::config::ContextConfig;
use crate::highlights::{HighlightId, HighlightRange};

/// Highlighted text plus the sentences around it
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContextWindow {
    pub target_text: String,
    /// Empty when the target could not be located
    pub context_text: String,
}

/// Flattened text of the segments around a highlight
struct SourceText {
    text: String,
    /// Byte offset of each included segment, by segment index
    offsets: Vec<(usize, usize)>,
}

impl SourceText {
    fn gather(segments: &[Segment], range: &AddressRange, depth: usize) -> Self {
        let mut text = String::new();
        let mut offsets = Vec::new();

        if segments.is_empty() {
            return Self { text, offsets };
        }

        let first = range.start.segment_index.saturating_sub(depth);
        let last = range
            .end
            .segment_index
            .saturating_add(depth)
            .min(segments.len() - 1);

        for (index, segment) in segments.iter().enumerate().take(last + 1).skip(first) {
            if segment.is_image() {
                continue;
            }
            if !offsets.is_empty() {
                text.push('\n');
            }
            offsets.push((index, text.len()));
            text.push_str(&segment.plain_text());
        }

        Self { text, offsets }
    }

    fn offset_of(&self, segment_index: usize) -> Option<usize> {
        self.offsets
            .iter()
            .find(|(index, _)| *index == segment_index)
            .map(|(_, offset)| *offset)
    }

    /// The highlighted tokens as they appear in the flattened text: one
    /// piece per text segment, joined by newlines. Empty pieces at either
    /// end are dropped.
    fn needle(&self, segments: &[Segment], range: &AddressRange) -> String {
        let mut pieces: Vec<String> = range
            .segments()
            .filter(|index| self.offset_of(*index).is_some())
            .map(|index| {
                let part = AddressRange::new(clip_start(range, index), clip_end(range, index));
                join_tokens(tokens_in_range(segments, &part))
            })
            .collect();
        while pieces.last().is_some_and(|p| p.is_empty()) {
            pieces.pop();
        }
        let leading = pieces.iter().take_while(|p| p.is_empty()).count();
        pieces[leading..].join("\n")
    }

    /// Byte position where the highlight should begin
    fn anchor(&self, segments: &[Segment], range: &AddressRange) -> usize {
        let start = range.start;
        let segment_offset = self.offset_of(start.segment_index).unwrap_or(0);
        let prefix = segments
            .get(start.segment_index)
            .map(|segment| {
                let tokens = segment.tokens();
                join_tokens(tokens[..start.token_index.min(tokens.len())].iter()).len()
            })
            .unwrap_or(0);
        segment_offset + prefix
    }

    /// Occurrence of `needle` closest to `anchor`
    fn locate(&self, needle: &str, anchor: usize) -> Option<Range<usize>> {
        if needle.is_empty() {
            return None;
        }
        self.text
            .match_indices(needle)
            .map(|(at, _)| at)
            .min_by_key(|at| at.abs_diff(anchor))
            .map(|at| at..at + needle.len())
    }
}

fn clip_start(range: &AddressRange, segment_index: usize) -> TokenAddress {
    if segment_index == range.start.segment_index {
        range.start
    } else {
        TokenAddress::new(segment_index, 0)
    }
}

fn clip_end(range: &AddressRange, segment_index: usize) -> TokenAddress {
    if segment_index == range.end.segment_index {
        range.end
    } else {
        TokenAddress::new(segment_index, usize::MAX - 1)
    }
}

/// `window` with surrounding whitespace removed, leaving `target` intact
fn trim_outside<'a>(text: &'a str, window: Range<usize>, target: &Range<usize>) -> &'a str {
    let before = &text[window.start..target.start];
    let after = &text[target.end..window.end];
    let start = window.start + (before.len() - before.trim_start().len());
    let end = window.end - (after.len() - after.trim_end().len());
    &text[start..end]
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Extract the target text and a sentence-aligned context window.
///
/// The context never exceeds `config.char_budget` chars and is always a
/// contiguous piece of the surrounding segment text. A segment boundary
/// inside the highlight shows up as `\n` in `target_text`, as it does in the
/// context, so a target that fits the budget is a substring of the context.
pub fn extract_context(
    highlight: &HighlightRange,
    segments: &[Segment],
    config: &ContextConfig,
) -> ContextWindow {
    let range = highlight.range;
    let source = SourceText::gather(segments, &range, config.segment_depth);
    let target_text = source.needle(segments, &range);
    let Some(target) = source.locate(&target_text, source.anchor(segments, &range)) else {
        tracing::debug!("Highlight {} text not found in its segments", highlight.id);
        return ContextWindow {
            target_text,
            context_text: String::new(),
        };
    };

    let text = source.text.as_str();
    let spans = sentence_spans(text);
    let (Some(first), Some(last)) = (
        sentence_at(&spans, target.start),
        sentence_at(&spans, target.end - 1),
    ) else {
        return ContextWindow {
            target_text,
            context_text: String::new(),
        };
    };

    let core = spans[first].start..spans[last].end;
    let mut length = char_len(&text[core.clone()]);
    if length > config.char_budget {
        tracing::debug!(
            "Target sentences of highlight {} exceed {} chars, truncating",
            highlight.id,
            config.char_budget
        );
        return ContextWindow {
            target_text,
            context_text: centered(text, core, target, config.char_budget),
        };
    }

    let (mut lo, mut hi) = (first, last);
    for _ in 0..config.sentence_depth {
        let mut grew = false;
        if lo > 0 {
            let extra = char_len(&text[spans[lo - 1].clone()]);
            if length + extra > config.char_budget {
                break;
            }
            lo -= 1;
            length += extra;
            grew = true;
        }
        if hi + 1 < spans.len() {
            let extra = char_len(&text[spans[hi + 1].clone()]);
            if length + extra > config.char_budget {
                break;
            }
            hi += 1;
            length += extra;
            grew = true;
        }
        if !grew {
            break;
        }
    }

    ContextWindow {
        target_text,
        context_text: trim_outside(text, spans[lo].start..spans[hi].end, &target).to_string(),
    }
}

/// Look up a confirmed highlight by id and extract its context
pub fn extract_context_by_id(
    id: HighlightId,
    confirmed: &[HighlightRange],
    segments: &[Segment],
    config: &ContextConfig,
) -> Option<ContextWindow> {
    let highlight = confirmed.iter().find(|h| h.id == id)?;
    Some(extract_context(highlight, segments, config))
}

/// At most `budget` chars of `core`, centered on `target`. The target is
/// kept whole when it fits.
fn centered(text: &str, core: Range<usize>, target: Range<usize>, budget: usize) -> String {
    let chars: Vec<char> = text[core.clone()].chars().collect();
    let target_start = char_len(&text[core.start..target.start]);
    let target_len = char_len(&text[target.clone()]);

    if target_len >= budget {
        return chars[target_start..target_start + budget].iter().collect();
    }

    let spare = budget - target_len;
    let before = target_start;
    let after = chars.len() - target_start - target_len;
    let right = (spare - (spare / 2).min(before)).min(after);
    let left = (spare - right).min(before);

    chars[target_start - left..target_start + target_len + right]
        .iter()
        .collect()
}
