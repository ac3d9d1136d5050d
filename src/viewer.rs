//! Viewer shell
//!
//! Composes the render controller, the session tracker, the blank-page
//! detector, and the persistence store into the reading surface the
//! embedding program drives. All input funnels through here: keys map to
//! navigation/zoom commands, focus and visibility changes become session
//! triggers, and session flush effects execute against the store.

use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use log::{error, info, warn};

use crate::blank::BlankFlags;
use crate::config::ViewerConfig;
use crate::engine::DocumentEngine;
use crate::notify::{NoticeBoard, NoticeLevel};
use crate::render::{Command, RenderController, RenderEvent, ScrollDirection, ViewportSize};
use crate::session::{
    ProgressTotals, SessionEffect, SessionSnapshot, SessionTracker, SessionTrigger,
};
use crate::sync::{LocalProgressCache, ProgressError, ProgressStore};

/// How long a blank-page warning stays up without dismissal
pub const BLANK_WARNING_DURATION: Duration = Duration::from_secs(10);

/// Navigation actions the keyboard surface maps to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewerAction {
    NextPage,
    PrevPage,
    ScrollUp,
    ScrollDown,
    ZoomIn,
    ZoomOut,
    ToggleFullscreen,
    Close,
}

/// Keyboard surface: arrows or h/l for pages, arrows for scroll, f for
/// fullscreen, escape to close.
#[must_use]
pub fn action_for_key(key: KeyCode) -> Option<ViewerAction> {
    match key {
        KeyCode::Right | KeyCode::Char('l' | 'L') => Some(ViewerAction::NextPage),
        KeyCode::Left | KeyCode::Char('h' | 'H') => Some(ViewerAction::PrevPage),
        KeyCode::Up => Some(ViewerAction::ScrollUp),
        KeyCode::Down => Some(ViewerAction::ScrollDown),
        KeyCode::Char('+' | '=') => Some(ViewerAction::ZoomIn),
        KeyCode::Char('-') => Some(ViewerAction::ZoomOut),
        KeyCode::Char('f' | 'F') => Some(ViewerAction::ToggleFullscreen),
        KeyCode::Esc => Some(ViewerAction::Close),
        _ => None,
    }
}

/// Live state surfaced to the embedding page
#[derive(Clone, Copy, Debug)]
pub struct ViewerTelemetry {
    /// Current page (1-based)
    pub page: usize,
    pub page_count: usize,
    /// Manual zoom as a percentage
    pub zoom_percent: u16,
    /// Scale of the last committed frame
    pub render_scale: Option<f32>,
    pub session: SessionSnapshot,
    pub fullscreen: bool,
    pub closed: bool,
}

/// The composed reading surface for one open book
pub struct Viewer<S: ProgressStore> {
    book_id: String,
    controller: RenderController,
    tracker: SessionTracker,
    store: Option<S>,
    local: LocalProgressCache,
    notices: NoticeBoard,
    flags: BlankFlags,
    seed_page: usize,
    fullscreen: bool,
    closed: bool,
    progress_refresh_needed: bool,
    auth_return_path: Option<String>,
    load_error: Option<String>,
}

impl<S: ProgressStore> Viewer<S> {
    /// Open a book: seed progress from the store (falling back to the local
    /// cache), start the render worker, and start a session.
    pub fn open<E: DocumentEngine>(
        book_id: impl Into<String>,
        engine: E,
        bytes: Vec<u8>,
        viewport: ViewportSize,
        store: Option<S>,
        local: LocalProgressCache,
        config: &ViewerConfig,
        now: Instant,
    ) -> Self {
        let book_id = book_id.into();

        let mut auth_return_path = None;
        let server_totals = match store.as_ref().map(|s| s.fetch(&book_id)) {
            Some(Ok(totals)) => totals,
            Some(Err(ProgressError::Unauthorized { return_path })) => {
                error!("progress fetch unauthorized for {book_id}");
                auth_return_path = Some(return_path);
                None
            }
            Some(Err(e)) => {
                warn!("progress fetch failed for {book_id}: {e}, using local cache");
                None
            }
            None => None,
        };

        let seed = server_totals
            .unwrap_or_default()
            .merge_max(local.totals(&book_id).unwrap_or_default());
        info!(
            "opening {book_id} at page {} ({}s read, {} pages)",
            seed.current_page, seed.total_reading_time, seed.total_pages_read
        );

        let tracking_enabled = store.is_some() && auth_return_path.is_none();
        let tracker = SessionTracker::new(seed, tracking_enabled)
            .with_inactivity_timeout(config.inactivity_timeout())
            .with_checkpoint_interval(config.checkpoint_interval());

        let controller = RenderController::with_config(
            engine,
            bytes,
            viewport,
            config.resize_debounce(),
            config.render_cache_pages,
        );

        let mut viewer = Self {
            book_id,
            controller,
            tracker,
            store,
            local,
            notices: NoticeBoard::new(),
            flags: BlankFlags::new(),
            seed_page: seed.current_page,
            fullscreen: false,
            closed: false,
            progress_refresh_needed: false,
            auth_return_path,
            load_error: None,
        };

        let effects = viewer.tracker.apply(SessionTrigger::Open, now);
        viewer.run_effects(&effects, now);
        viewer
    }

    /// Handle a key press. Every key press counts as qualifying activity.
    pub fn handle_key(&mut self, key: KeyCode, now: Instant) {
        if self.closed {
            return;
        }

        let effects = self.tracker.apply(SessionTrigger::Activity, now);
        self.run_effects(&effects, now);

        match action_for_key(key) {
            Some(ViewerAction::NextPage) => {
                self.go_to_page(self.controller.state().current_page + 1, now);
            }
            Some(ViewerAction::PrevPage) => {
                let target = self.controller.state().current_page.saturating_sub(1).max(1);
                self.go_to_page(target, now);
            }
            Some(ViewerAction::ScrollUp) => {
                self.controller.apply(Command::Scroll(ScrollDirection::Up));
            }
            Some(ViewerAction::ScrollDown) => {
                self.controller.apply(Command::Scroll(ScrollDirection::Down));
            }
            Some(ViewerAction::ZoomIn) => self.controller.apply(Command::ZoomIn),
            Some(ViewerAction::ZoomOut) => self.controller.apply(Command::ZoomOut),
            Some(ViewerAction::ToggleFullscreen) => self.fullscreen = !self.fullscreen,
            Some(ViewerAction::Close) => self.close(now),
            None => {}
        }
    }

    fn go_to_page(&mut self, page: usize, now: Instant) {
        let before = self.controller.state().current_page;
        self.controller.apply(Command::GoToPage(page));
        let after = self.controller.state().current_page;

        if after != before {
            let effects = self.tracker.apply(SessionTrigger::PageChanged(after), now);
            self.run_effects(&effects, now);
        }
    }

    /// Record a raw viewport resize; the re-render fires after the
    /// quiescence window from [`Self::pump`].
    pub fn on_resize(&mut self, viewport: ViewportSize, now: Instant) {
        if !self.closed {
            self.controller.resize(viewport, now);
        }
    }

    /// Qualifying pointer/scroll/touch activity from the embedding page
    pub fn on_pointer_activity(&mut self, now: Instant) {
        if !self.closed {
            let effects = self.tracker.apply(SessionTrigger::Activity, now);
            self.run_effects(&effects, now);
        }
    }

    pub fn on_focus_gained(&mut self, now: Instant) {
        if !self.closed {
            let effects = self.tracker.apply(SessionTrigger::FocusGained, now);
            self.run_effects(&effects, now);
        }
    }

    pub fn on_focus_lost(&mut self, now: Instant) {
        if !self.closed {
            let effects = self.tracker.apply(SessionTrigger::FocusLost, now);
            self.run_effects(&effects, now);
        }
    }

    pub fn on_visibility_changed(&mut self, visible: bool, now: Instant) {
        if self.closed {
            return;
        }
        let trigger = if visible {
            SessionTrigger::BecameVisible
        } else {
            SessionTrigger::BecameHidden
        };
        let effects = self.tracker.apply(trigger, now);
        self.run_effects(&effects, now);
    }

    /// Drive the pipeline: drain render events, analyze committed frames,
    /// tick the session clock, expire notices. Call this at least once per
    /// second while the viewer is open.
    pub fn pump(&mut self, now: Instant) {
        if self.closed {
            return;
        }

        for event in self.controller.poll(now) {
            match event {
                RenderEvent::DocumentReady { page_count } => {
                    info!("document ready: {page_count} pages");
                    if self.seed_page > 1 {
                        self.controller.apply(Command::GoToPage(self.seed_page));
                    }
                }

                RenderEvent::FrameCommitted { page, scale, raster } => {
                    let blank = self.flags.record(page, scale, &raster);
                    self.dismiss_blank_warnings();
                    if blank {
                        warn!("page {page} rendered blank (pixel statistics)");
                        self.notices.push(
                            format!("Page {page} appears to be blank"),
                            NoticeLevel::Warning,
                            BLANK_WARNING_DURATION,
                            now,
                        );
                    }
                }

                RenderEvent::RenderFailed { message } => {
                    self.notices.push(
                        format!("Render failed: {message}"),
                        NoticeLevel::Error,
                        BLANK_WARNING_DURATION,
                        now,
                    );
                }

                RenderEvent::LoadFailed(e) => {
                    error!("document load failed: {e}");
                    self.load_error = Some(e.to_string());
                }
            }
        }

        let effects = self.tracker.apply(SessionTrigger::Tick, now);
        self.run_effects(&effects, now);
        let _ = self.notices.expire(now);
    }

    /// End the session, flush totals, and shut the render worker down.
    /// Safe to call multiple times.
    pub fn close(&mut self, now: Instant) {
        if self.closed {
            return;
        }

        let effects = self.tracker.apply(SessionTrigger::Close, now);
        self.run_effects(&effects, now);
        self.controller.shutdown();
        self.closed = true;
        self.progress_refresh_needed = true;
        info!("viewer closed for {}", self.book_id);
    }

    fn run_effects(&mut self, effects: &[SessionEffect], now: Instant) {
        for effect in effects {
            let SessionEffect::Flush(update) = effect;

            let totals = ProgressTotals {
                current_page: update.current_page,
                total_reading_time: update.total_reading_time,
                total_pages_read: update.total_pages_read,
            };
            self.local.update(&self.book_id, totals);

            let Some(store) = self.store.as_mut() else {
                continue;
            };

            match store.push(&self.book_id, update) {
                Ok(()) => {
                    if !update.is_session_start {
                        self.progress_refresh_needed = true;
                    }
                }
                Err(ProgressError::Unauthorized { return_path }) => {
                    error!("progress push unauthorized for {}", self.book_id);
                    self.auth_return_path = Some(return_path);
                }
                Err(e) => {
                    warn!("progress push failed for {}: {e}", self.book_id);
                    self.notices.push(
                        "Could not sync reading progress; keeping a local copy",
                        NoticeLevel::Warning,
                        Duration::from_secs(5),
                        now,
                    );
                }
            }
        }
    }

    fn dismiss_blank_warnings(&mut self) {
        self.notices
            .dismiss_where(|n| n.level == NoticeLevel::Warning && n.message.contains("blank"));
    }

    /// Dismiss the newest notice explicitly
    pub fn dismiss_notice(&mut self) {
        let _ = self.notices.dismiss();
    }

    #[must_use]
    pub fn telemetry(&self) -> ViewerTelemetry {
        let state = self.controller.state();
        ViewerTelemetry {
            page: state.current_page,
            page_count: state.page_count,
            zoom_percent: (state.manual_zoom * 100.0).round() as u16,
            render_scale: self.controller.current_render_scale(),
            session: self.tracker.snapshot(),
            fullscreen: self.fullscreen,
            closed: self.closed,
        }
    }

    #[must_use]
    pub fn controller(&self) -> &RenderController {
        &self.controller
    }

    #[must_use]
    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    /// Blank flag for a page, if it was ever analyzed
    #[must_use]
    pub fn blank_flag(&self, page: usize) -> Option<bool> {
        self.flags.get(page)
    }

    /// Blocking load failure, if any
    #[must_use]
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Sign-in return path set when the credential was rejected
    #[must_use]
    pub fn auth_return_path(&self) -> Option<&str> {
        self.auth_return_path.as_deref()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True once the embedding page should refresh its progress display;
    /// reading the flag clears it.
    pub fn take_progress_refresh(&mut self) -> bool {
        std::mem::take(&mut self.progress_refresh_needed)
    }
}

impl<S: ProgressStore> Drop for Viewer<S> {
    fn drop(&mut self) {
        if !self.closed {
            self.close(Instant::now());
        }
    }
}
