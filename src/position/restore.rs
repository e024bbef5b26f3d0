//! Position restoration
//!
//! Turns a stored scroll fraction back into a scroll offset after a chapter
//! reload. Layout may still be changing (images loading, fonts swapping), so
//! the engine retries until the measured offset is close enough to the
//! target, restarting whenever the content grows, with a hard cap on
//! attempts.
//!
//! Every [`RestorationEngine::begin`] starts a new generation. Attempts and
//! resize notifications carrying an older generation are ignored, which is
//! how a superseded chapter load is cancelled.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use super::scroll::ScrollOriginFilter;
use super::types::clamp_fraction;
use crate::config::RestoreConfig;

/// Measurement and scrolling on the rendering surface
pub trait LayoutSurface {
    /// Largest reachable scroll offset (content height minus viewport)
    fn max_scroll_extent(&self) -> f64;

    fn scroll_offset(&self) -> f64;

    fn scroll_to(&mut self, offset: f64);
}

/// How the chapter was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// Page reload or reopening the book; restore the saved position
    Reload,
    /// Explicit move to the next chapter
    Forward,
    /// Explicit move to the previous chapter
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestoreRequest {
    pub fraction: f64,
    pub navigation: NavigationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    /// Nothing to restore
    Idle,
    Restoring,
    Restored,
}

/// Result of a single restoration attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RestoreStep {
    /// The generation was superseded
    Abandoned,
    /// The engine is not restoring
    Inactive,
    /// Not close enough yet
    Retry { target: f64, actual: f64, attempt: u32 },
    Converged { offset: f64 },
    /// Attempt cap reached; the current offset is accepted
    GaveUp { offset: f64 },
}

impl RestoreStep {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RestoreStep::Converged { .. } | RestoreStep::GaveUp { .. })
    }
}

#[derive(Debug)]
struct EngineState {
    generation: u64,
    fraction: f64,
    attempts: u32,
    state: RestoreState,
    /// Set once the settle window has passed; a resize no longer reopens
    settled: bool,
}

/// Scroll restoration state machine for one reading surface
#[derive(Clone)]
pub struct RestorationEngine {
    config: RestoreConfig,
    filter: Arc<ScrollOriginFilter>,
    inner: Arc<Mutex<EngineState>>,
}

impl RestorationEngine {
    pub fn new(config: RestoreConfig, filter: Arc<ScrollOriginFilter>) -> Self {
        Self {
            config,
            filter,
            inner: Arc::new(Mutex::new(EngineState {
                generation: 0,
                fraction: 0.0,
                attempts: 0,
                state: RestoreState::Idle,
                settled: false,
            })),
        }
    }

    pub fn config(&self) -> &RestoreConfig {
        &self.config
    }

    pub fn filter(&self) -> &Arc<ScrollOriginFilter> {
        &self.filter
    }

    pub fn state(&self) -> RestoreState {
        self.inner.lock().state
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Start a new chapter load and return its generation.
    ///
    /// Restoration only runs for a reload with a non-zero saved fraction.
    pub fn begin(&self, request: RestoreRequest) -> u64 {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.fraction = clamp_fraction(request.fraction);
        inner.attempts = 0;
        inner.settled = false;
        inner.state = if inner.fraction > 0.0 && request.navigation == NavigationKind::Reload {
            RestoreState::Restoring
        } else {
            RestoreState::Idle
        };

        tracing::debug!(
            "Restore generation {}: fraction={:.4}, navigation={:?}, state={:?}",
            inner.generation,
            inner.fraction,
            request.navigation,
            inner.state
        );
        inner.generation
    }

    /// Scroll to the target once and check how close the surface got
    pub fn attempt(&self, generation: u64, surface: &mut dyn LayoutSurface) -> RestoreStep {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return RestoreStep::Abandoned;
        }
        if inner.state != RestoreState::Restoring {
            return RestoreStep::Inactive;
        }

        let extent = surface.max_scroll_extent().max(0.0);
        let target = inner.fraction * extent;
        self.filter.mark_programmatic();
        surface.scroll_to(target);
        let actual = surface.scroll_offset();

        let threshold = self.config.threshold_px.max(extent * 0.01);
        if (actual - target).abs() < threshold {
            inner.state = RestoreState::Restored;
            tracing::debug!(
                "Restored scroll position {:.1}/{:.1} after {} retries",
                actual,
                extent,
                inner.attempts
            );
            return RestoreStep::Converged { offset: actual };
        }

        inner.attempts += 1;
        if inner.attempts >= self.config.max_attempts {
            inner.state = RestoreState::Restored;
            tracing::warn!(
                "Giving up scroll restoration after {} attempts: target={:.1}, actual={:.1}",
                inner.attempts,
                target,
                actual
            );
            return RestoreStep::GaveUp { offset: actual };
        }

        tracing::debug!(
            "Restore attempt {}: target={:.1}, actual={:.1}",
            inner.attempts,
            target,
            actual
        );
        RestoreStep::Retry {
            target,
            actual,
            attempt: inner.attempts,
        }
    }

    /// The content root changed height.
    ///
    /// Resets the attempt counter. A restoration that already finished is
    /// reopened unless it has settled.
    pub fn on_content_resized(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }
        match inner.state {
            RestoreState::Restoring => inner.attempts = 0,
            RestoreState::Restored if !inner.settled => {
                tracing::debug!("Content resized before settling, restoring again");
                inner.state = RestoreState::Restoring;
                inner.attempts = 0;
            }
            _ => {}
        }
    }

    /// Close the settle window; later resizes leave the position alone
    pub fn settle(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation == generation {
            inner.settled = true;
        }
    }
}

/// Drive the current generation's restoration to completion.
///
/// Attempts run once per configured frame. After a terminal step the driver keeps
/// watching `resizes` (the content root's height) for the configured number
/// of settle frames; a height change in that window restarts restoration.
/// Returns the final step, `Inactive` if nothing needed restoring, or
/// `Abandoned` if a newer generation began.
pub async fn restore_position<S>(
    engine: &RestorationEngine,
    surface: &mut S,
    mut resizes: watch::Receiver<f64>,
) -> RestoreStep
where
    S: LayoutSurface,
{
    let generation = engine.generation();
    let RestoreConfig {
        frame,
        settle_frames,
        ..
    } = *engine.config();
    let mut last_height = *resizes.borrow_and_update();
    let mut resizes_open = true;
    let mut outcome: Option<RestoreStep> = None;
    let mut settle_remaining = 0u32;

    loop {
        match engine.attempt(generation, &mut *surface) {
            RestoreStep::Abandoned => return RestoreStep::Abandoned,
            RestoreStep::Inactive => match outcome {
                None => return RestoreStep::Inactive,
                Some(step) if settle_remaining == 0 => {
                    engine.settle(generation);
                    return step;
                }
                Some(_) => settle_remaining -= 1,
            },
            step if step.is_terminal() => {
                outcome = Some(step);
                settle_remaining = settle_frames;
            }
            _ => {}
        }

        if resizes_open {
            tokio::select! {
                _ = tokio::time::sleep(frame) => {}
                changed = resizes.changed() => match changed {
                    Ok(()) => {
                        let height = *resizes.borrow_and_update();
                        if height != last_height {
                            last_height = height;
                            engine.on_content_resized(generation);
                        }
                    }
                    Err(_) => resizes_open = false,
                },
            }
        } else {
            tokio::time::sleep(frame).await;
        }
        engine.filter().on_animation_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Layout whose reachable offset can lag behind its reported extent
    struct FakeLayout {
        extent: f64,
        offset: f64,
        reachable: VecDeque<f64>,
        scrolls: usize,
    }

    impl FakeLayout {
        fn new(extent: f64) -> Self {
            Self {
                extent,
                offset: 0.0,
                reachable: VecDeque::new(),
                scrolls: 0,
            }
        }

        fn lagging(extent: f64, reachable: &[f64]) -> Self {
            Self {
                reachable: reachable.iter().copied().collect(),
                ..Self::new(extent)
            }
        }
    }

    impl LayoutSurface for FakeLayout {
        fn max_scroll_extent(&self) -> f64 {
            self.extent
        }

        fn scroll_offset(&self) -> f64 {
            self.offset
        }

        fn scroll_to(&mut self, offset: f64) {
            self.scrolls += 1;
            let limit = self.reachable.pop_front().unwrap_or(self.extent);
            self.offset = offset.min(limit).min(self.extent);
        }
    }

    fn engine() -> RestorationEngine {
        RestorationEngine::new(RestoreConfig::default(), Arc::new(ScrollOriginFilter::new()))
    }

    fn reload(fraction: f64) -> RestoreRequest {
        RestoreRequest {
            fraction,
            navigation: NavigationKind::Reload,
        }
    }

    #[test]
    fn test_idle_without_saved_fraction_or_on_navigation() {
        let engine = engine();

        engine.begin(reload(0.0));
        assert_eq!(engine.state(), RestoreState::Idle);

        engine.begin(RestoreRequest {
            fraction: 0.5,
            navigation: NavigationKind::Forward,
        });
        assert_eq!(engine.state(), RestoreState::Idle);

        engine.begin(RestoreRequest {
            fraction: 0.5,
            navigation: NavigationKind::Backward,
        });
        assert_eq!(engine.state(), RestoreState::Idle);

        let generation = engine.begin(reload(0.5));
        assert_eq!(engine.state(), RestoreState::Restoring);
        assert_eq!(generation, 4);
    }

    #[test]
    fn test_converges_on_stable_layout() {
        let engine = engine();
        let generation = engine.begin(reload(0.42));
        let mut layout = FakeLayout::new(3200.0);

        let step = engine.attempt(generation, &mut layout);
        assert_eq!(step, RestoreStep::Converged { offset: 1344.0 });
        assert_eq!(engine.state(), RestoreState::Restored);
        assert_eq!(engine.attempt(generation, &mut layout), RestoreStep::Inactive);
    }

    #[test]
    fn test_converges_within_one_attempt_after_layout_stabilizes() {
        let engine = engine();
        let generation = engine.begin(reload(0.5));
        // Layout only reaches the target from the fourth scroll on
        let mut layout = FakeLayout::lagging(2000.0, &[100.0, 400.0, 700.0]);

        let mut attempts = 0;
        let step = loop {
            attempts += 1;
            let step = engine.attempt(generation, &mut layout);
            if step.is_terminal() {
                break step;
            }
        };

        assert_eq!(step, RestoreStep::Converged { offset: 1000.0 });
        assert_eq!(attempts, 4);
    }

    #[test]
    fn test_threshold_scales_with_extent() {
        let engine = engine();
        let generation = engine.begin(reload(0.5));
        // 1% of 10000 is 100px; landing 60px short still converges
        let mut layout = FakeLayout::lagging(10_000.0, &[4940.0]);

        assert_eq!(
            engine.attempt(generation, &mut layout),
            RestoreStep::Converged { offset: 4940.0 }
        );
    }

    #[test]
    fn test_gives_up_at_attempt_cap() {
        let config = RestoreConfig {
            max_attempts: 3,
            ..RestoreConfig::default()
        };
        let engine = RestorationEngine::new(config, Arc::new(ScrollOriginFilter::new()));
        let generation = engine.begin(reload(0.9));
        let mut layout = FakeLayout::lagging(1000.0, &[0.0; 10]);

        assert!(matches!(engine.attempt(generation, &mut layout), RestoreStep::Retry { attempt: 1, .. }));
        assert!(matches!(engine.attempt(generation, &mut layout), RestoreStep::Retry { attempt: 2, .. }));
        assert_eq!(engine.attempt(generation, &mut layout), RestoreStep::GaveUp { offset: 0.0 });
        assert_eq!(engine.state(), RestoreState::Restored);
    }

    #[test]
    fn test_resize_resets_attempt_counter() {
        let config = RestoreConfig {
            max_attempts: 3,
            ..RestoreConfig::default()
        };
        let engine = RestorationEngine::new(config, Arc::new(ScrollOriginFilter::new()));
        let generation = engine.begin(reload(0.9));
        let mut layout = FakeLayout::lagging(1000.0, &[0.0; 10]);

        engine.attempt(generation, &mut layout);
        engine.attempt(generation, &mut layout);
        engine.on_content_resized(generation);

        assert!(matches!(engine.attempt(generation, &mut layout), RestoreStep::Retry { attempt: 1, .. }));
    }

    #[test]
    fn test_stale_generation_is_abandoned() {
        let engine = engine();
        let old = engine.begin(reload(0.3));
        let new = engine.begin(reload(0.6));
        let mut layout = FakeLayout::new(1000.0);

        assert_eq!(engine.attempt(old, &mut layout), RestoreStep::Abandoned);
        assert_eq!(layout.scrolls, 0);

        engine.on_content_resized(old);
        assert_eq!(engine.attempt(new, &mut layout), RestoreStep::Converged { offset: 600.0 });
    }

    #[test]
    fn test_attempt_marks_scroll_programmatic() {
        let filter = Arc::new(ScrollOriginFilter::new());
        let engine = RestorationEngine::new(RestoreConfig::default(), Arc::clone(&filter));
        let generation = engine.begin(reload(0.2));

        engine.attempt(generation, &mut FakeLayout::new(500.0));
        assert_eq!(filter.classify_scroll(), crate::position::ScrollOrigin::Programmatic);
    }

    /// Surface whose layout the test can change while the driver runs
    #[derive(Clone)]
    struct SharedLayout(Arc<Mutex<FakeLayout>>);

    impl LayoutSurface for SharedLayout {
        fn max_scroll_extent(&self) -> f64 {
            self.0.lock().max_scroll_extent()
        }

        fn scroll_offset(&self) -> f64 {
            self.0.lock().scroll_offset()
        }

        fn scroll_to(&mut self, offset: f64) {
            self.0.lock().scroll_to(offset)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_image_load_restores_again() {
        let engine = engine();
        engine.begin(reload(0.42));
        let layout = SharedLayout(Arc::new(Mutex::new(FakeLayout::new(800.0))));
        let (tx, rx) = watch::channel(1600.0);

        let mut surface = layout.clone();
        let driver = restore_position(&engine, &mut surface, rx);
        let images = async {
            // Images finish loading three frames after the first convergence
            tokio::time::sleep(Duration::from_millis(40)).await;
            layout.0.lock().extent = 3200.0;
            tx.send_replace(4000.0);
        };

        let (step, ()) = tokio::join!(driver, images);
        assert_eq!(step, RestoreStep::Converged { offset: 1344.0 });
        assert_eq!(layout.scroll_offset(), 1344.0);

        // Past the settle window a resize no longer moves the position
        engine.on_content_resized(engine.generation());
        assert_eq!(engine.state(), RestoreState::Restored);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_returns_inactive_when_idle() {
        let engine = engine();
        engine.begin(RestoreRequest {
            fraction: 0.42,
            navigation: NavigationKind::Forward,
        });
        let mut layout = FakeLayout::new(3200.0);
        let (_tx, rx) = watch::channel(0.0);

        let step = restore_position(&engine, &mut layout, rx).await;
        assert_eq!(step, RestoreStep::Inactive);
        assert_eq!(layout.scrolls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_stops_when_superseded() {
        let engine = engine();
        engine.begin(reload(0.5));
        // Never reaches the target
        let mut layout = FakeLayout::lagging(1000.0, &[0.0; 100]);
        let (tx, rx) = watch::channel(0.0);
        // Closed channel: the driver falls back to plain frame delays
        drop(tx);

        let next = engine.clone();
        let driver = restore_position(&engine, &mut layout, rx);
        let navigate = async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            next.begin(reload(0.1));
        };

        let (step, ()) = tokio::join!(driver, navigate);
        assert_eq!(step, RestoreStep::Abandoned);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_paces_attempts_by_configured_frame() {
        let config = RestoreConfig {
            frame: Duration::from_millis(100),
            settle_frames: 2,
            ..RestoreConfig::default()
        };
        let engine = RestorationEngine::new(config, Arc::new(ScrollOriginFilter::new()));
        engine.begin(reload(0.5));
        // Two short scrolls before the target is reachable
        let mut layout = FakeLayout::lagging(1000.0, &[0.0, 0.0]);
        let (_tx, rx) = watch::channel(0.0);

        let started = tokio::time::Instant::now();
        let step = restore_position(&engine, &mut layout, rx).await;

        assert_eq!(step, RestoreStep::Converged { offset: 500.0 });
        // Two retries, then the settle window of two frames plus the final check
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(500), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(600), "{:?}", elapsed);
    }
}
