//! Token address types
//!
//! A token address names one token inside a chapter's segment list as a
//! `(segment_index, token_index)` pair. Addresses only mean something
//! relative to the chapter they were taken from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position of a single token within a chapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAddress {
    /// Index of the segment within the chapter
    pub segment_index: usize,
    /// Index of the token within the segment
    pub token_index: usize,
}

/// Inclusive range of token addresses, always stored with `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRange {
    pub start: TokenAddress,
    pub end: TokenAddress,
}

impl TokenAddress {
    pub const fn new(segment_index: usize, token_index: usize) -> Self {
        Self {
            segment_index,
            token_index,
        }
    }
}

impl AddressRange {
    /// Create a range from two endpoints, swapping them if given in reverse
    pub fn new(start: TokenAddress, end: TokenAddress) -> Self {
        if end < start {
            Self {
                start: end,
                end: start,
            }
        } else {
            Self { start, end }
        }
    }

    /// Range covering a single token
    pub fn single(address: TokenAddress) -> Self {
        Self {
            start: address,
            end: address,
        }
    }

    /// Check whether `address` lies inside this range (inclusive)
    pub fn contains(&self, address: &TokenAddress) -> bool {
        super::is_in_range(address, &self.start, &self.end)
    }

    /// Check whether the range stays inside one segment
    pub fn is_single_segment(&self) -> bool {
        self.start.segment_index == self.end.segment_index
    }

    /// Segment indices touched by the range, in order
    pub fn segments(&self) -> std::ops::RangeInclusive<usize> {
        self.start.segment_index..=self.end.segment_index
    }
}

/// String form used as the index key by rendering code: `"{segment}-{token}"`
impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.segment_index, self.token_index)
    }
}

/// Error parsing an address key
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid address key: {0:?}")]
pub struct AddressKeyError(pub String);

impl FromStr for TokenAddress {
    type Err = AddressKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (segment, token) = s
            .split_once('-')
            .ok_or_else(|| AddressKeyError(s.to_string()))?;
        let segment_index = segment
            .parse()
            .map_err(|_| AddressKeyError(s.to_string()))?;
        let token_index = token.parse().map_err(|_| AddressKeyError(s.to_string()))?;
        Ok(Self::new(segment_index, token_index))
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}
