//! Address model for tokenized chapters
//!
//! Positions inside a chapter are named by `(segment_index, token_index)`.
//! Ranges are inclusive on both ends and ordered lexicographically.
//!
//! # Usage
//!
//! ```
//! use shiori_engine::address::{addresses_overlap, AddressRange, TokenAddress};
//!
//! let wide = AddressRange::new(TokenAddress::new(2, 4), TokenAddress::new(5, 0));
//! let single = AddressRange::single(TokenAddress::new(3, 0));
//! assert!(addresses_overlap(&wide, &single));
//! ```

mod comparator;
mod types;

pub use comparator::{addresses_overlap, compare_address, is_in_range};
pub use types::{AddressKeyError, AddressRange, TokenAddress};
