//! Reading position
//!
//! Tracks where the reader is, persists it through the progress service, and
//! brings the scroll position back when a chapter is reloaded:
//!
//! - [`ReadingPositionStore`] keeps the latest position and flushes snapshots
//! - [`ScrollOriginFilter`] tells restoration scrolls from user scrolls
//! - [`RestorationEngine`] retries a stored fraction until layout settles

pub mod restore;
pub mod scroll;
pub mod store;
mod types;

pub use restore::{
    restore_position, LayoutSurface, NavigationKind, RestorationEngine, RestoreRequest, RestoreState,
    RestoreStep,
};
pub use scroll::{ReadingTracker, ScrollEvent, ScrollOrigin, ScrollOriginFilter};
pub use store::{FlushOutcome, ReadingPositionStore};
pub use types::ReadingPosition;
