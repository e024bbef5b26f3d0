//! Annotation lifecycle controller
//!
//! Owns a chapter's confirmed and pending highlights and keeps the derived
//! [`HighlightIndex`] in step with them. Creates and deletes take effect
//! locally at once and are reconciled with the highlight service in a
//! spawned task.
//!
//! The state lock is a `parking_lot::RwLock` and is never held across an
//! `.await`. Every mutation rebuilds the index and publishes the new
//! snapshot on a watch channel.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::index::{build_index, find_highlight_at, HighlightIndex};
use super::types::{HighlightDraft, HighlightId, HighlightKey, HighlightRange, PendingHighlight, TempId};
use crate::address::TokenAddress;
use crate::chapter::Chapter;
use crate::services::{ChapterSource, CreateHighlightRequest, HighlightService};

/// Result of a create once the server has answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Pending entry promoted to a confirmed highlight with this id
    Confirmed(HighlightId),
    /// Request failed; the pending entry was removed
    RolledBack,
}

/// Returned by [`AnnotationController::create_highlight`]
#[derive(Debug)]
pub enum CreateHandle {
    /// The same range is already highlighted or being created; nothing sent
    Duplicate,
    Spawned {
        temp_id: TempId,
        task: JoinHandle<CreateOutcome>,
    },
}

/// Result of a delete once the server has answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Request failed; the highlight stays removed locally
    Failed,
}

/// Returned by [`AnnotationController::delete_highlight`]
#[derive(Debug)]
pub enum DeleteHandle {
    NotFound,
    /// A delete for this id is still outstanding
    AlreadyInFlight,
    Spawned(JoinHandle<DeleteOutcome>),
}

struct AnnotationState {
    confirmed: Vec<HighlightRange>,
    pending: Vec<PendingHighlight>,
    segment_token_counts: Option<HashMap<usize, usize>>,
    deleting: HashSet<HighlightId>,
    index: Arc<HighlightIndex>,
}

impl AnnotationState {
    fn is_duplicate(&self, draft: &HighlightDraft) -> bool {
        self.confirmed.iter().any(|h| h.range == draft.range)
            || self.pending.iter().any(|p| p.range == draft.range)
    }

    fn rebuild(&mut self) -> Arc<HighlightIndex> {
        self.index = Arc::new(build_index(
            &self.confirmed,
            &self.pending,
            self.segment_token_counts.as_ref(),
        ));
        Arc::clone(&self.index)
    }
}

struct ControllerInner {
    book_id: String,
    chapter_index: usize,
    service: Arc<dyn HighlightService>,
    state: RwLock<AnnotationState>,
    index_tx: watch::Sender<Arc<HighlightIndex>>,
}

impl ControllerInner {
    /// Run `f` under the write lock, then rebuild and publish the index.
    fn mutate<T>(&self, f: impl FnOnce(&mut AnnotationState) -> T) -> T {
        let mut state = self.state.write();
        let result = f(&mut state);
        let index = state.rebuild();
        self.index_tx.send_replace(index);
        result
    }

    async fn settle_create(self: Arc<Self>, pending: PendingHighlight) -> CreateOutcome {
        let request = CreateHighlightRequest::from_pending(&self.book_id, &pending);
        let temp_id = pending.temp_id;

        match self.service.create(&request).await {
            Ok(id) => {
                // Swap pending for confirmed in one step
                self.mutate(|state| {
                    state.pending.retain(|p| p.temp_id != temp_id);
                    if !state.confirmed.iter().any(|h| h.id == id) {
                        state.confirmed.push(pending.confirm(id));
                    }
                });
                tracing::info!(
                    "Created highlight: id={}, book_id={}, chapter={}",
                    id,
                    self.book_id,
                    self.chapter_index
                );
                CreateOutcome::Confirmed(id)
            }
            Err(e) => {
                self.mutate(|state| state.pending.retain(|p| p.temp_id != temp_id));
                tracing::warn!("Highlight create failed, rolled back {}: {}", temp_id, e);
                CreateOutcome::RolledBack
            }
        }
    }

    async fn settle_delete(self: Arc<Self>, id: HighlightId) -> DeleteOutcome {
        let result = self.service.delete(id).await;

        {
            let mut state = self.state.write();
            state.deleting.remove(&id);
        }

        match result {
            Ok(()) => {
                tracing::info!("Deleted highlight: id={}", id);
                DeleteOutcome::Deleted
            }
            Err(e) => {
                // Not rolled back; the next chapter load re-syncs
                tracing::warn!("Highlight delete failed for {}: {}", id, e);
                DeleteOutcome::Failed
            }
        }
    }
}

/// Per-chapter highlight state with optimistic create and delete
#[derive(Clone)]
pub struct AnnotationController {
    inner: Arc<ControllerInner>,
}

impl AnnotationController {
    /// Create a controller for one chapter.
    ///
    /// `segment_token_counts` bounds the index; pass `None` while layout data
    /// is not yet available.
    pub fn new(
        book_id: impl Into<String>,
        chapter_index: usize,
        confirmed: Vec<HighlightRange>,
        segment_token_counts: Option<HashMap<usize, usize>>,
        service: Arc<dyn HighlightService>,
    ) -> Self {
        let index = Arc::new(build_index(&confirmed, &[], segment_token_counts.as_ref()));
        let (index_tx, _) = watch::channel(Arc::clone(&index));

        Self {
            inner: Arc::new(ControllerInner {
                book_id: book_id.into(),
                chapter_index,
                service,
                state: RwLock::new(AnnotationState {
                    confirmed,
                    pending: Vec::new(),
                    segment_token_counts,
                    deleting: HashSet::new(),
                    index,
                }),
                index_tx,
            }),
        }
    }

    /// Fetch a chapter and seed a controller with the highlights stored
    /// alongside it
    pub async fn load(
        book_id: &str,
        chapter_index: usize,
        source: &dyn ChapterSource,
        service: Arc<dyn HighlightService>,
    ) -> crate::error::Result<(Self, Chapter)> {
        let chapter = source.get_chapter(book_id, chapter_index).await?;
        let controller = Self::new(
            book_id,
            chapter_index,
            chapter.confirmed_highlights(),
            Some(chapter.segment_token_counts()),
            service,
        );
        tracing::debug!(
            "Loaded chapter {} of {}: {} segments, {} highlights",
            chapter_index,
            book_id,
            chapter.segments.len(),
            chapter.highlights.len()
        );
        Ok((controller, chapter))
    }

    pub fn book_id(&self) -> &str {
        &self.inner.book_id
    }

    pub fn chapter_index(&self) -> usize {
        self.inner.chapter_index
    }

    /// Current index snapshot
    pub fn index(&self) -> Arc<HighlightIndex> {
        Arc::clone(&self.inner.state.read().index)
    }

    /// Receive every new index snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<HighlightIndex>> {
        self.inner.index_tx.subscribe()
    }

    pub fn confirmed(&self) -> Vec<HighlightRange> {
        self.inner.state.read().confirmed.clone()
    }

    pub fn pending(&self) -> Vec<PendingHighlight> {
        self.inner.state.read().pending.clone()
    }

    pub fn get(&self, id: HighlightId) -> Option<HighlightRange> {
        self.inner
            .state
            .read()
            .confirmed
            .iter()
            .find(|h| h.id == id)
            .cloned()
    }

    /// Which highlight, if any, is painted over `address`
    pub fn highlight_at(&self, address: &TokenAddress) -> Option<HighlightKey> {
        let state = self.inner.state.read();
        find_highlight_at(&state.confirmed, &state.pending, address)
    }

    /// Create a highlight.
    ///
    /// The pending entry is visible in the index before this returns; the
    /// server request runs in a spawned task. Must be called from within a
    /// tokio runtime.
    pub fn create_highlight(&self, draft: HighlightDraft) -> CreateHandle {
        let pending = {
            let mut state = self.inner.state.write();
            if state.is_duplicate(&draft) {
                tracing::debug!("Ignoring duplicate highlight request for {}", draft.range);
                return CreateHandle::Duplicate;
            }
            let pending = PendingHighlight::from_draft(draft, self.inner.chapter_index);
            state.pending.push(pending.clone());
            let index = state.rebuild();
            self.inner.index_tx.send_replace(index);
            pending
        };

        let temp_id = pending.temp_id;
        let task = tokio::spawn(Arc::clone(&self.inner).settle_create(pending));
        CreateHandle::Spawned { temp_id, task }
    }

    /// Delete a confirmed highlight.
    ///
    /// It disappears from the index immediately. A failed request is not
    /// rolled back. Must be called from within a tokio runtime.
    pub fn delete_highlight(&self, id: HighlightId) -> DeleteHandle {
        {
            let mut state = self.inner.state.write();
            if state.deleting.contains(&id) {
                return DeleteHandle::AlreadyInFlight;
            }
            let before = state.confirmed.len();
            state.confirmed.retain(|h| h.id != id);
            if state.confirmed.len() == before {
                return DeleteHandle::NotFound;
            }
            state.deleting.insert(id);
            let index = state.rebuild();
            self.inner.index_tx.send_replace(index);
        }

        DeleteHandle::Spawned(tokio::spawn(Arc::clone(&self.inner).settle_delete(id)))
    }

    /// Replace the confirmed set with a fresh copy from the server.
    ///
    /// Pending entries are kept; highlights with an outstanding delete stay
    /// hidden.
    pub fn replace_confirmed(&self, confirmed: Vec<HighlightRange>) {
        self.inner.mutate(|state| {
            state.confirmed = confirmed
                .into_iter()
                .filter(|h| !state.deleting.contains(&h.id))
                .collect();
        });
    }

    /// Update segment lengths (e.g. once layout has been measured)
    pub fn set_segment_token_counts(&self, counts: Option<HashMap<usize, usize>>) {
        self.inner.mutate(|state| state.segment_token_counts = counts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressRange;
    use crate::error::ServiceError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI64, Ordering};
    use tokio::sync::Notify;

    /// Highlight service that can hold each request until released
    struct GatedService {
        next_id: AtomicI64,
        fail: bool,
        gate: Option<Arc<Notify>>,
        created: Mutex<Vec<CreateHighlightRequest>>,
        deleted: Mutex<Vec<HighlightId>>,
    }

    impl GatedService {
        fn new(fail: bool, gate: Option<Arc<Notify>>) -> Arc<Self> {
            Arc::new(Self {
                next_id: AtomicI64::new(100),
                fail,
                gate,
                created: Mutex::new(Vec::new()),
                deleted: Mutex::new(Vec::new()),
            })
        }

        async fn wait(&self) {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }
    }

    #[async_trait]
    impl HighlightService for GatedService {
        async fn create(&self, request: &CreateHighlightRequest) -> Result<HighlightId, ServiceError> {
            self.created.lock().push(request.clone());
            self.wait().await;
            if self.fail {
                return Err(ServiceError::Unavailable("offline".to_string()));
            }
            Ok(HighlightId(self.next_id.fetch_add(1, Ordering::SeqCst)))
        }

        async fn delete(&self, id: HighlightId) -> Result<(), ServiceError> {
            self.deleted.lock().push(id);
            self.wait().await;
            if self.fail {
                return Err(ServiceError::Unavailable("offline".to_string()));
            }
            Ok(())
        }
    }

    fn addr(segment: usize, token: usize) -> TokenAddress {
        TokenAddress::new(segment, token)
    }

    fn draft(start: (usize, usize), end: (usize, usize), style: &str) -> HighlightDraft {
        HighlightDraft::new(
            AddressRange::new(addr(start.0, start.1), addr(end.0, end.1)),
            style,
            "text",
        )
    }

    fn counts() -> Option<HashMap<usize, usize>> {
        Some([(0, 5), (1, 5), (2, 5)].into_iter().collect())
    }

    fn controller(service: Arc<GatedService>) -> AnnotationController {
        AnnotationController::new("book-1", 0, Vec::new(), counts(), service)
    }

    fn spawned(handle: CreateHandle) -> (TempId, JoinHandle<CreateOutcome>) {
        match handle {
            CreateHandle::Spawned { temp_id, task } => (temp_id, task),
            CreateHandle::Duplicate => panic!("unexpected duplicate"),
        }
    }

    #[tokio::test]
    async fn test_optimistic_create_then_confirm() {
        let gate = Arc::new(Notify::new());
        let service = GatedService::new(false, Some(Arc::clone(&gate)));
        let controller = controller(Arc::clone(&service));

        let (temp_id, task) = spawned(controller.create_highlight(draft((0, 3), (1, 2), "vocab")));

        // Visible before the server answers
        let index = controller.index();
        assert_eq!(index.len(), 5);
        assert_eq!(index.style_at(&addr(0, 3)).unwrap().as_str(), "vocab");
        assert_eq!(
            controller.highlight_at(&addr(1, 0)),
            Some(HighlightKey::Pending(temp_id))
        );

        gate.notify_one();
        let outcome = task.await.unwrap();
        let CreateOutcome::Confirmed(id) = outcome else {
            panic!("expected confirmation, got {:?}", outcome);
        };

        // Same coverage, now through the confirmed entry
        assert_eq!(controller.index().addresses(), index.addresses());
        assert!(controller.pending().is_empty());
        assert_eq!(controller.get(id).unwrap().style.as_str(), "vocab");
        assert_eq!(controller.highlight_at(&addr(1, 0)), Some(HighlightKey::Confirmed(id)));

        let request = service.created.lock()[0].clone();
        assert_eq!(request.book_id, "book-1");
        assert_eq!(request.start_token_idx, 3);
        assert_eq!(request.end_segment_index, 1);
    }

    #[tokio::test]
    async fn test_no_snapshot_without_highlight_during_confirm() {
        let gate = Arc::new(Notify::new());
        let service = GatedService::new(false, Some(Arc::clone(&gate)));
        let controller = controller(service);
        let mut rx = controller.subscribe();

        let (_, task) = spawned(controller.create_highlight(draft((2, 0), (2, 1), "default")));
        rx.borrow_and_update();

        gate.notify_one();
        task.await.unwrap();

        // Every snapshot published after the optimistic insert covers the range
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert!(snapshot.is_highlighted(&addr(2, 0)));
        assert!(snapshot.is_highlighted(&addr(2, 1)));
    }

    #[tokio::test]
    async fn test_failed_create_rolls_back() {
        let service = GatedService::new(true, None);
        let controller = controller(service);

        let (_, task) = spawned(controller.create_highlight(draft((0, 0), (0, 2), "grammar")));
        assert_eq!(task.await.unwrap(), CreateOutcome::RolledBack);

        assert!(controller.index().is_empty());
        assert!(controller.pending().is_empty());
        assert!(controller.confirmed().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_create_is_ignored() {
        let gate = Arc::new(Notify::new());
        let service = GatedService::new(false, Some(Arc::clone(&gate)));
        let controller = controller(Arc::clone(&service));

        let (_, task) = spawned(controller.create_highlight(draft((0, 1), (0, 2), "vocab")));
        // Same range while pending
        assert!(matches!(
            controller.create_highlight(draft((0, 1), (0, 2), "grammar")),
            CreateHandle::Duplicate
        ));

        gate.notify_one();
        task.await.unwrap();

        // Same range once confirmed
        assert!(matches!(
            controller.create_highlight(draft((0, 1), (0, 2), "vocab")),
            CreateHandle::Duplicate
        ));
        assert_eq!(service.created.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_optimistic() {
        let gate = Arc::new(Notify::new());
        let service = GatedService::new(false, Some(Arc::clone(&gate)));
        let existing = vec![HighlightRange {
            id: HighlightId(7),
            chapter_index: 0,
            range: AddressRange::new(addr(0, 0), addr(0, 1)),
            style: "vocab".into(),
            source_text: "彼は".to_string(),
        }];
        let controller = AnnotationController::new("book-1", 0, existing, counts(), service);
        assert_eq!(controller.index().len(), 2);

        let DeleteHandle::Spawned(task) = controller.delete_highlight(HighlightId(7)) else {
            panic!("expected delete to be issued");
        };
        assert!(controller.index().is_empty());
        assert!(matches!(
            controller.delete_highlight(HighlightId(7)),
            DeleteHandle::AlreadyInFlight
        ));

        gate.notify_one();
        assert_eq!(task.await.unwrap(), DeleteOutcome::Deleted);
        assert!(matches!(controller.delete_highlight(HighlightId(7)), DeleteHandle::NotFound));
    }

    #[tokio::test]
    async fn test_failed_delete_is_not_rolled_back() {
        let service = GatedService::new(true, None);
        let existing = vec![HighlightRange {
            id: HighlightId(3),
            chapter_index: 0,
            range: AddressRange::single(addr(1, 1)),
            style: "default".into(),
            source_text: String::new(),
        }];
        let controller = AnnotationController::new("book-1", 0, existing, counts(), service);

        let DeleteHandle::Spawned(task) = controller.delete_highlight(HighlightId(3)) else {
            panic!("expected delete to be issued");
        };
        assert_eq!(task.await.unwrap(), DeleteOutcome::Failed);
        assert!(controller.index().is_empty());
        assert!(controller.get(HighlightId(3)).is_none());
    }

    #[tokio::test]
    async fn test_replace_confirmed_hides_in_flight_deletes() {
        let gate = Arc::new(Notify::new());
        let service = GatedService::new(false, Some(Arc::clone(&gate)));
        let make = |id: i64, token: usize| HighlightRange {
            id: HighlightId(id),
            chapter_index: 0,
            range: AddressRange::single(addr(0, token)),
            style: "default".into(),
            source_text: String::new(),
        };
        let controller =
            AnnotationController::new("book-1", 0, vec![make(1, 0), make(2, 1)], counts(), service);

        let DeleteHandle::Spawned(task) = controller.delete_highlight(HighlightId(1)) else {
            panic!("expected delete to be issued");
        };
        // A reload that still contains the highlight being deleted
        controller.replace_confirmed(vec![make(1, 0), make(2, 1), make(3, 2)]);
        assert_eq!(controller.index().addresses(), vec![addr(0, 1), addr(0, 2)]);

        gate.notify_one();
        task.await.unwrap();
    }

    struct OneChapter(Chapter);

    #[async_trait]
    impl ChapterSource for OneChapter {
        async fn get_chapter(&self, _book_id: &str, chapter_index: usize) -> Result<Chapter, ServiceError> {
            if chapter_index == self.0.index {
                Ok(self.0.clone())
            } else {
                Err(ServiceError::Status {
                    status: 404,
                    body: "Chapter not found".to_string(),
                })
            }
        }
    }

    #[tokio::test]
    async fn test_load_seeds_from_chapter() {
        let chapter: Chapter = serde_json::from_value(serde_json::json!({
            "index": 2,
            "title": "第二章",
            "segments": [
                {"type": "text", "tokens": [{"s": "猫"}, {"s": "が"}, {"s": "鳴い"}, {"s": "た"}]},
                {"type": "image", "src": "/static/books/b/images/2.png", "alt": ""}
            ],
            "highlights": [{
                "id": 11,
                "start_segment_index": 0,
                "start_token_idx": 0,
                "end_segment_index": 1,
                "end_token_idx": 3,
                "style_category": "vocab"
            }]
        }))
        .unwrap();
        let source = OneChapter(chapter);
        let service = GatedService::new(false, None);

        let (controller, chapter) = AnnotationController::load("book-1", 2, &source, service.clone())
            .await
            .unwrap();
        assert_eq!(chapter.segments.len(), 2);
        assert_eq!(controller.get(HighlightId(11)).unwrap().source_text, "猫が鳴いた");
        // Image segment has no tokens to mark
        assert_eq!(controller.index().len(), 4);

        assert!(AnnotationController::load("book-1", 3, &source, service).await.is_err());
    }

    #[tokio::test]
    async fn test_token_counts_change_rebuilds_index() {
        let service = GatedService::new(false, None);
        let existing = vec![HighlightRange {
            id: HighlightId(1),
            chapter_index: 0,
            range: AddressRange::new(addr(0, 3), addr(1, 0)),
            style: "default".into(),
            source_text: String::new(),
        }];
        let controller = AnnotationController::new("book-1", 0, existing, None, service);
        assert!(controller.index().len() > 5);

        controller.set_segment_token_counts(counts());
        assert_eq!(
            controller.index().addresses(),
            vec![addr(0, 3), addr(0, 4), addr(1, 0)]
        );
    }
}
