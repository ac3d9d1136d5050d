//! Render controller - owns the viewport state and the render pipeline
//!
//! One worker thread rasterizes pages; the controller issues generation-tagged
//! requests and raises the supersession watermark on every new render, so an
//! in-flight render for an older (page, scale, viewport) triple is canceled
//! rather than queued. Only a frame matching the latest generation commits to
//! the surface.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};
use log::{debug, warn};

use super::cache::RasterCache;
use super::debounce::Debouncer;
use super::request::{Generation, RenderRequest, RenderResponse, ViewportSize};
use super::state::{Command, Effect, ViewportState};
use super::surface::Surface;
use super::worker::render_worker;
use crate::engine::{DocumentEngine, LoadError, Raster};

/// Default quiescence window for viewport resize coalescing
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(250);
/// Default raster cache capacity in pages
pub const DEFAULT_CACHE_PAGES: usize = 8;

/// Events surfaced to the composing shell on [`RenderController::poll`]
#[derive(Debug)]
pub enum RenderEvent {
    /// Document opened; initial render was issued
    DocumentReady { page_count: usize },

    /// A frame for the current state committed to the surface
    FrameCommitted {
        page: usize,
        scale: f32,
        raster: Arc<Raster>,
    },

    /// Rasterization failed for the current state
    RenderFailed { message: String },

    /// The document bytes could not be opened
    LoadFailed(LoadError),
}

/// Manages rendering for one open document
pub struct RenderController {
    state: ViewportState,
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    latest: Arc<AtomicU64>,
    next_generation: u64,
    cache: Arc<Mutex<RasterCache>>,
    resize_debounce: Debouncer<ViewportSize>,
    surface: Surface,
    current_render_scale: Option<f32>,
    render_error: Option<String>,
    document_ready: bool,
}

impl RenderController {
    /// Spawn the render worker for `bytes` and return the controller.
    #[must_use]
    pub fn new<E: DocumentEngine>(engine: E, bytes: Vec<u8>, viewport: ViewportSize) -> Self {
        Self::with_config(engine, bytes, viewport, RESIZE_DEBOUNCE, DEFAULT_CACHE_PAGES)
    }

    #[must_use]
    pub fn with_config<E: DocumentEngine>(
        engine: E,
        bytes: Vec<u8>,
        viewport: ViewportSize,
        resize_debounce: Duration,
        cache_pages: usize,
    ) -> Self {
        let cache = Arc::new(Mutex::new(RasterCache::new(cache_pages)));
        let latest = Arc::new(AtomicU64::new(0));

        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        {
            let latest = Arc::clone(&latest);
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                render_worker(engine, bytes, request_rx, response_tx, latest, cache);
            });
        }

        Self {
            state: ViewportState::new(viewport),
            request_tx,
            response_rx,
            latest,
            next_generation: 0,
            cache,
            resize_debounce: Debouncer::new(resize_debounce),
            surface: Surface::new(),
            current_render_scale: None,
            render_error: None,
            document_ready: false,
        }
    }

    /// Current viewport state
    #[must_use]
    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    /// The surface holding the latest committed frame
    #[must_use]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Scale of the last committed frame, for display
    #[must_use]
    pub fn current_render_scale(&self) -> Option<f32> {
        self.current_render_scale
    }

    /// User-visible render error, if the latest render failed
    #[must_use]
    pub fn render_error(&self) -> Option<&str> {
        self.render_error.as_deref()
    }

    #[must_use]
    pub fn document_ready(&self) -> bool {
        self.document_ready
    }

    /// Apply a command to the viewport state and execute its effects
    pub fn apply(&mut self, cmd: Command) {
        let effects = self.state.apply(cmd);
        self.execute_effects(effects);
    }

    /// Record a raw resize event; the render triggers only after the
    /// quiescence window, from [`Self::poll`].
    pub fn resize(&mut self, viewport: ViewportSize, now: Instant) {
        self.resize_debounce.push(viewport, now);
    }

    fn execute_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::InvalidateCache => {
                    self.cache
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .invalidate_all();
                }

                Effect::RenderCurrentPage => {
                    self.issue_render();
                }
            }
        }
    }

    fn issue_render(&mut self) {
        if !self.document_ready || self.state.page_count == 0 || self.state.viewport.is_empty() {
            return;
        }

        self.next_generation += 1;
        let generation = Generation::new(self.next_generation);
        self.latest.store(generation.0, Ordering::Release);

        let params = self.state.render_params();
        debug!(
            "render gen {} page {} scale {:.3}",
            generation.0, params.page, params.scale
        );
        let _ = self.request_tx.send(RenderRequest::Page { generation, params });
    }

    /// Drain worker responses and the resize debouncer, committing at most
    /// the latest-generation frame to the surface.
    pub fn poll(&mut self, now: Instant) -> Vec<RenderEvent> {
        let mut events = Vec::new();

        if let Some(viewport) = self.resize_debounce.poll(now) {
            self.apply(Command::SetViewport(viewport));
        }

        while let Ok(response) = self.response_rx.try_recv() {
            match response {
                RenderResponse::DocumentReady {
                    page_count,
                    page_sizes,
                } => {
                    self.document_ready = true;
                    self.apply(Command::SetDocument {
                        page_count,
                        page_sizes,
                    });
                    events.push(RenderEvent::DocumentReady { page_count });
                }

                RenderResponse::Frame {
                    generation,
                    page,
                    scale,
                    raster,
                } => {
                    if generation.0 == self.latest.load(Ordering::Acquire) {
                        self.surface.present(&raster);
                        self.current_render_scale = Some(scale);
                        self.render_error = None;
                        events.push(RenderEvent::FrameCommitted { page, scale, raster });
                    } else {
                        debug!("dropping stale frame gen {} page {page}", generation.0);
                    }
                }

                RenderResponse::Canceled(generation) => {
                    debug!("render gen {} canceled", generation.0);
                }

                RenderResponse::Error { generation, fault } => {
                    if generation.0 == self.latest.load(Ordering::Acquire) {
                        let message = fault.to_string();
                        warn!("render failed: {message}");
                        self.render_error = Some(message.clone());
                        events.push(RenderEvent::RenderFailed { message });
                    }
                }

                RenderResponse::LoadFailed(e) => {
                    events.push(RenderEvent::LoadFailed(e));
                }
            }
        }

        events
    }

    /// Shut the worker down. Safe to call multiple times.
    pub fn shutdown(&self) {
        let _ = self.request_tx.send(RenderRequest::Shutdown);
    }
}

impl Drop for RenderController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeEngine;
    use crate::render::state::ScrollDirection;

    fn pump_until<F>(controller: &mut RenderController, timeout: Duration, mut stop: F) -> Vec<RenderEvent>
    where
        F: FnMut(&RenderEvent) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut events = Vec::new();
        loop {
            let now = Instant::now();
            let mut done = false;
            for event in controller.poll(now) {
                done = done || stop(&event);
                events.push(event);
            }
            if done || Instant::now() >= deadline {
                return events;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn ready_controller(engine: FakeEngine) -> RenderController {
        let mut controller = RenderController::with_config(
            engine,
            Vec::new(),
            ViewportSize::new(1000, 1000),
            Duration::from_millis(50),
            4,
        );
        let events = pump_until(&mut controller, Duration::from_secs(2), |e| {
            matches!(e, RenderEvent::DocumentReady { .. })
        });
        assert!(
            events
                .iter()
                .any(|e| matches!(e, RenderEvent::DocumentReady { .. })),
            "document never became ready"
        );
        controller
    }

    #[test]
    fn initial_frame_commits_at_fit_scale() {
        let mut controller = ready_controller(FakeEngine::textured_document(3, 500.0, 1000.0));

        let events = pump_until(&mut controller, Duration::from_secs(2), |e| {
            matches!(e, RenderEvent::FrameCommitted { .. })
        });

        let committed = events
            .iter()
            .find_map(|e| match e {
                RenderEvent::FrameCommitted { page, scale, .. } => Some((*page, *scale)),
                _ => None,
            })
            .expect("no frame committed");

        // fit = min(1000/500, 1000/1000) = 1.0
        assert_eq!(committed, (1, 1.0));
        assert_eq!(controller.surface().width(), 500);
        assert_eq!(controller.surface().height(), 1000);
    }

    #[test]
    fn rapid_navigation_commits_only_the_final_state() {
        let engine = FakeEngine::textured_document(10, 500.0, 1000.0)
            .with_render_delay(Duration::from_millis(40));
        let mut controller = ready_controller(engine);

        // Supersede the initial render twice, then change zoom, all while
        // renders are still in flight.
        controller.apply(Command::GoToPage(2));
        controller.apply(Command::GoToPage(3));
        controller.apply(Command::ZoomIn);

        let events = pump_until(&mut controller, Duration::from_secs(3), |e| {
            matches!(e, RenderEvent::FrameCommitted { .. })
        });

        let commits: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                RenderEvent::FrameCommitted { page, scale, .. } => Some((*page, *scale)),
                _ => None,
            })
            .collect();

        assert_eq!(commits.len(), 1, "superseded renders must not commit");
        let (page, scale) = commits[0];
        assert_eq!(page, 3);
        assert!((scale - 1.2).abs() < 1e-6);
        assert_eq!(controller.state().current_page, 3);
    }

    #[test]
    fn resize_storm_triggers_a_single_render() {
        let engine = FakeEngine::textured_document(2, 500.0, 1000.0);
        let counter = engine.render_counter();
        let mut controller = ready_controller(engine);

        let _ = pump_until(&mut controller, Duration::from_secs(2), |e| {
            matches!(e, RenderEvent::FrameCommitted { .. })
        });
        let renders_before = counter.load(std::sync::atomic::Ordering::SeqCst);

        let t0 = Instant::now();
        for step in 0..5 {
            controller.resize(ViewportSize::new(800 + step, 600), t0);
        }

        // Within the quiescence window nothing renders
        let _ = controller.poll(t0 + Duration::from_millis(10));
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), renders_before);

        std::thread::sleep(Duration::from_millis(80));
        let events = pump_until(&mut controller, Duration::from_secs(2), |e| {
            matches!(e, RenderEvent::FrameCommitted { .. })
        });

        assert!(events
            .iter()
            .any(|e| matches!(e, RenderEvent::FrameCommitted { .. })));
        assert_eq!(controller.state().viewport, ViewportSize::new(804, 600));
        assert_eq!(
            counter.load(std::sync::atomic::Ordering::SeqCst),
            renders_before + 1,
            "coalesced resizes must issue exactly one render"
        );
    }

    #[test]
    fn scroll_does_not_issue_renders() {
        let engine = FakeEngine::textured_document(2, 500.0, 1000.0);
        let counter = engine.render_counter();
        let mut controller = ready_controller(engine);

        let _ = pump_until(&mut controller, Duration::from_secs(2), |e| {
            matches!(e, RenderEvent::FrameCommitted { .. })
        });
        let renders_before = counter.load(std::sync::atomic::Ordering::SeqCst);

        controller.apply(Command::Scroll(ScrollDirection::Down));
        controller.apply(Command::Scroll(ScrollDirection::Up));
        std::thread::sleep(Duration::from_millis(30));
        let _ = controller.poll(Instant::now());

        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), renders_before);
    }

    #[test]
    fn load_failure_surfaces_as_event() {
        let mut controller = RenderController::new(
            FakeEngine::broken(),
            Vec::new(),
            ViewportSize::new(100, 100),
        );

        let events = pump_until(&mut controller, Duration::from_secs(2), |e| {
            matches!(e, RenderEvent::LoadFailed(_))
        });

        assert!(events.iter().any(|e| matches!(e, RenderEvent::LoadFailed(_))));
        assert!(!controller.document_ready());
    }
}
