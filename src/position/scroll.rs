//! Scroll-origin filter and reading tracker
//!
//! Scrolls issued by the restoration engine must not be mistaken for the
//! reader scrolling, or they would overwrite the saved position before it has
//! been restored. The filter stays set for the frame of a programmatic
//! scroll and one animation frame after it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::store::{FlushOutcome, ReadingPositionStore};

/// Frames a programmatic mark lasts: the current one plus one more
const PROGRAMMATIC_FRAMES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOrigin {
    Programmatic,
    User,
}

#[derive(Debug, Default)]
pub struct ScrollOriginFilter {
    frames_remaining: AtomicU32,
}

impl ScrollOriginFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag scroll events until one animation frame after this frame
    pub fn mark_programmatic(&self) {
        self.frames_remaining.store(PROGRAMMATIC_FRAMES, Ordering::SeqCst);
    }

    /// Call once per animation frame
    pub fn on_animation_frame(&self) {
        self.frames_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok();
    }

    pub fn classify_scroll(&self) -> ScrollOrigin {
        if self.frames_remaining.load(Ordering::SeqCst) > 0 {
            ScrollOrigin::Programmatic
        } else {
            ScrollOrigin::User
        }
    }
}

/// A scroll event as reported by the rendering surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollEvent {
    pub offset: f64,
    pub max_extent: f64,
    /// Segment nearest the top of the viewport
    pub segment_index: usize,
}

impl ScrollEvent {
    pub fn fraction(&self) -> f64 {
        if self.max_extent > 0.0 {
            self.offset / self.max_extent
        } else {
            0.0
        }
    }
}

/// Feeds user scrolls in one chapter into a position store
pub struct ReadingTracker {
    chapter_index: usize,
    filter: Arc<ScrollOriginFilter>,
    store: ReadingPositionStore,
}

impl ReadingTracker {
    pub fn new(chapter_index: usize, filter: Arc<ScrollOriginFilter>, store: ReadingPositionStore) -> Self {
        Self {
            chapter_index,
            filter,
            store,
        }
    }

    /// Record the position for user scrolls and schedule a debounced save.
    /// Programmatic scrolls are ignored.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_scroll(&self, event: ScrollEvent) -> ScrollOrigin {
        let origin = self.filter.classify_scroll();
        if origin == ScrollOrigin::User {
            self.store
                .record_position(self.chapter_index, event.segment_index, event.fraction());
            self.store.schedule_flush();
        }
        origin
    }

    /// Flush immediately, e.g. when the chapter is torn down
    pub async fn finish(&self) -> FlushOutcome {
        self.store.flush().await
    }
}
