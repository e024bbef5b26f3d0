//! Highlight index
//!
//! Derived lookup from token address to the style painted over it. The index
//! is always rebuilt from scratch; it is never patched in place.

use std::collections::HashMap;

use crate::address::TokenAddress;

use super::types::{HighlightKey, HighlightRange, PendingHighlight, StyleCategory, StyledRange};

/// Token count assumed for a segment whose length is unknown.
///
/// Over-marks the tail of a short segment whose length was not reported;
/// never under-marks.
pub const UNKNOWN_SEGMENT_TOKEN_SENTINEL: usize = 1000;

/// Immutable per-token style map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightIndex {
    styles: HashMap<TokenAddress, StyleCategory>,
}

impl HighlightIndex {
    /// Style painted over `address`, if any
    pub fn style_at(&self, address: &TokenAddress) -> Option<&StyleCategory> {
        self.styles.get(address)
    }

    pub fn is_highlighted(&self, address: &TokenAddress) -> bool {
        self.styles.contains_key(address)
    }

    /// Number of marked tokens
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Marked addresses in reading order
    pub fn addresses(&self) -> Vec<TokenAddress> {
        let mut addrs: Vec<TokenAddress> = self.styles.keys().copied().collect();
        addrs.sort();
        addrs
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TokenAddress, &StyleCategory)> {
        self.styles.iter()
    }

    /// String-keyed view (`"{segment}-{token}"`) for rendering code
    pub fn to_key_map(&self) -> HashMap<String, StyleCategory> {
        self.styles
            .iter()
            .map(|(addr, style)| (addr.to_string(), style.clone()))
            .collect()
    }

    fn paint<R: StyledRange>(&mut self, item: &R, counts: Option<&HashMap<usize, usize>>) {
        let range = item.range();
        let style = item.style();
        let max_known_segment = counts.and_then(|c| c.keys().max().copied());

        for segment_index in range.segments() {
            if let Some(max) = max_known_segment {
                if segment_index > max {
                    // Past the end of the chapter as currently known
                    break;
                }
            }

            let known_count = counts.and_then(|c| c.get(&segment_index).copied());
            let first = if segment_index == range.start.segment_index {
                range.start.token_index
            } else {
                0
            };
            // Exclusive upper bound
            let mut last = if segment_index == range.end.segment_index {
                range.end.token_index.saturating_add(1)
            } else {
                known_count.unwrap_or(UNKNOWN_SEGMENT_TOKEN_SENTINEL)
            };
            if let Some(count) = known_count {
                last = last.min(count);
            }

            for token_index in first..last {
                self.styles
                    .insert(TokenAddress::new(segment_index, token_index), style.clone());
            }
        }
    }
}

/// Build the highlight index from confirmed and pending ranges.
///
/// Ranges are painted in a fixed order: all confirmed ranges in slice order,
/// then all pending ranges in slice order. Where ranges overlap, the range
/// painted last wins, so optimistic styles show over confirmed ones.
///
/// `segment_token_counts` bounds each segment. Without it, or for a segment
/// missing from it, segments that the range passes through are assumed to
/// hold [`UNKNOWN_SEGMENT_TOKEN_SENTINEL`] tokens. Addresses outside known
/// bounds are skipped.
pub fn build_index(
    confirmed: &[HighlightRange],
    pending: &[PendingHighlight],
    segment_token_counts: Option<&HashMap<usize, usize>>,
) -> HighlightIndex {
    let mut index = HighlightIndex::default();

    for highlight in confirmed {
        index.paint(highlight, segment_token_counts);
    }
    for highlight in pending {
        index.paint(highlight, segment_token_counts);
    }

    tracing::debug!(
        "Rebuilt highlight index: {} confirmed, {} pending, {} tokens marked",
        confirmed.len(),
        pending.len(),
        index.len()
    );

    index
}

/// Find which highlight owns `address`, using the same precedence as
/// [`build_index`] (pending over confirmed, later over earlier).
pub fn find_highlight_at(
    confirmed: &[HighlightRange],
    pending: &[PendingHighlight],
    address: &TokenAddress,
) -> Option<HighlightKey> {
    pending
        .iter()
        .rev()
        .find(|p| p.range.contains(address))
        .map(|p| HighlightKey::Pending(p.temp_id))
        .or_else(|| {
            confirmed
                .iter()
                .rev()
                .find(|h| h.range.contains(address))
                .map(|h| HighlightKey::Confirmed(h.id))
        })
}
