//! Reading-position store
//!
//! Only the latest position is kept. Flushes write one complete snapshot
//! and are serialized, so persisted writes never land out of order. A
//! snapshot equal to the last one persisted is not written again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::types::ReadingPosition;
use crate::config::PositionConfig;
use crate::error::ServiceError;
use crate::services::ProgressService;

/// What a flush did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlushOutcome {
    /// Nothing new since the last successful write
    Clean,
    Written(ReadingPosition),
    /// The write failed; the store stays dirty
    Failed,
}

#[derive(Debug, Default)]
struct Snapshots {
    current: Option<ReadingPosition>,
    persisted: Option<ReadingPosition>,
}

struct StoreInner {
    book_id: String,
    service: Arc<dyn ProgressService>,
    debounce: Duration,
    snapshots: Mutex<Snapshots>,
    flush_lock: tokio::sync::Mutex<()>,
    generation: AtomicU64,
}

/// Latest reading position for one book
#[derive(Clone)]
pub struct ReadingPositionStore {
    inner: Arc<StoreInner>,
}

impl ReadingPositionStore {
    pub fn new(
        book_id: impl Into<String>,
        service: Arc<dyn ProgressService>,
        config: &PositionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                book_id: book_id.into(),
                service,
                debounce: config.debounce,
                snapshots: Mutex::new(Snapshots::default()),
                flush_lock: tokio::sync::Mutex::new(()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Create a store seeded with the persisted position, if there is one
    pub async fn load(
        book_id: impl Into<String>,
        service: Arc<dyn ProgressService>,
        config: &PositionConfig,
    ) -> Result<Self, ServiceError> {
        let store = Self::new(book_id, service, config);
        let saved = store.inner.service.get(&store.inner.book_id).await?;

        if let Some(position) = saved {
            tracing::debug!(
                "Loaded reading position for {}: chapter={}, segment={}, fraction={:.3}",
                store.inner.book_id,
                position.chapter_index,
                position.segment_index,
                position.progress_percentage
            );
            let mut snapshots = store.inner.snapshots.lock();
            snapshots.current = Some(position);
            snapshots.persisted = Some(position);
        }

        Ok(store)
    }

    pub fn book_id(&self) -> &str {
        &self.inner.book_id
    }

    /// Most recently recorded position
    pub fn current(&self) -> Option<ReadingPosition> {
        self.inner.snapshots.lock().current
    }

    /// Whether the current position differs from the last one persisted
    pub fn is_dirty(&self) -> bool {
        let snapshots = self.inner.snapshots.lock();
        snapshots.current.is_some() && snapshots.current != snapshots.persisted
    }

    /// Replace the current position. `fraction` is clamped into [0, 1].
    pub fn record_position(&self, chapter_index: usize, segment_index: usize, fraction: f64) {
        let position = ReadingPosition::new(chapter_index, segment_index, fraction);
        self.inner.snapshots.lock().current = Some(position);
    }

    /// Persist the current position.
    ///
    /// Safe to call any number of times; concurrent calls run one after
    /// another and a repeat of an already persisted snapshot is skipped.
    pub async fn flush(&self) -> FlushOutcome {
        let _guard = self.inner.flush_lock.lock().await;

        let snapshot = {
            let snapshots = self.inner.snapshots.lock();
            match snapshots.current {
                Some(current) if snapshots.persisted != Some(current) => current,
                _ => return FlushOutcome::Clean,
            }
        };

        match self.inner.service.put(&self.inner.book_id, &snapshot).await {
            Ok(()) => {
                self.inner.snapshots.lock().persisted = Some(snapshot);
                tracing::debug!(
                    "Saved reading position for {}: chapter={}, segment={}",
                    self.inner.book_id,
                    snapshot.chapter_index,
                    snapshot.segment_index
                );
                FlushOutcome::Written(snapshot)
            }
            Err(e) => {
                tracing::warn!("Failed to save reading position for {}: {}", self.inner.book_id, e);
                FlushOutcome::Failed
            }
        }
    }

    /// Flush after the debounce delay unless another flush is scheduled first.
    ///
    /// The task resolves to `None` when it was superseded. Must be called
    /// from within a tokio runtime.
    pub fn schedule_flush(&self) -> JoinHandle<Option<FlushOutcome>> {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let store = self.clone();

        tokio::spawn(async move {
            tokio::time::sleep(store.inner.debounce).await;
            if store.inner.generation.load(Ordering::SeqCst) != generation {
                return None;
            }
            Some(store.flush().await)
        })
    }
}
