//! Address comparison and overlap
//!
//! Addresses are ordered lexicographically by `(segment_index, token_index)`.

use std::cmp::Ordering;

use super::types::*;

impl Ord for TokenAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segment_index
            .cmp(&other.segment_index)
            .then(self.token_index.cmp(&other.token_index))
    }
}

impl PartialOrd for TokenAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two addresses in reading order
pub fn compare_address(a: &TokenAddress, b: &TokenAddress) -> Ordering {
    a.cmp(b)
}

/// Check if an address falls within an inclusive range
pub fn is_in_range(address: &TokenAddress, start: &TokenAddress, end: &TokenAddress) -> bool {
    address >= start && address <= end
}

/// Check whether two inclusive ranges share at least one address.
///
/// Intermediate segments of a multi-segment range are fully covered, so a
/// range spanning segments 2..=5 overlaps any address in segment 3.
pub fn addresses_overlap(a: &AddressRange, b: &AddressRange) -> bool {
    a.start <= b.end && b.start <= a.end
}
